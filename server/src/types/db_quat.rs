/// A quaternion (w + xi + yj + zk), stored as four `f32` scalars.
///
/// Semantics:
/// - Stored in `(x, y, z, w)` order to match common game engine conventions.
/// - Not guaranteed to be normalized on the wire; readers normalize.
#[derive(spacetimedb::SpacetimeType, Debug, Clone, Copy, PartialEq)]
pub struct DbQuat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl DbQuat {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for DbQuat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<DbQuat> for nalgebra::Quaternion<f32> {
    fn from(q: DbQuat) -> Self {
        nalgebra::Quaternion::new(q.w, q.x, q.y, q.z)
    }
}
impl From<&DbQuat> for nalgebra::Quaternion<f32> {
    fn from(q: &DbQuat) -> Self {
        nalgebra::Quaternion::new(q.w, q.x, q.y, q.z)
    }
}

impl From<nalgebra::Quaternion<f32>> for DbQuat {
    fn from(q: nalgebra::Quaternion<f32>) -> Self {
        DbQuat {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

impl From<nalgebra::UnitQuaternion<f32>> for DbQuat {
    fn from(uq: nalgebra::UnitQuaternion<f32>) -> Self {
        uq.into_inner().into()
    }
}
