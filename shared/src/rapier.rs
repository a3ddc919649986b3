use rapier3d::{
    na::{Isometry3, Translation3, UnitQuaternion},
    prelude::*,
};

/// Definition of an immutable piece of streamed world geometry.
///
/// Ground slabs, road surfaces, tree trunks and ramps are all described this way.
#[derive(Clone, Debug)]
pub struct StaticBodyDef {
    /// World-space translation of the body (collider centre).
    pub translation: Vector<f32>,
    /// World-space rotation (unit quaternion).
    pub rotation: UnitQuaternion<f32>,
    /// Collider shape parameters.
    pub shape: ColliderShapeDef,
}

impl StaticBodyDef {
    pub fn new(
        translation: Vector<f32>,
        rotation: UnitQuaternion<f32>,
        shape: ColliderShapeDef,
    ) -> Self {
        Self {
            translation,
            rotation,
            shape,
        }
    }

    pub fn pose(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }
}

/// Supported static collider shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum ColliderShapeDef {
    /// Oriented cuboid with given half-extents (meters).
    Cuboid { half_extents: Vector<f32> },

    /// Y-aligned cylinder (meters).
    CylinderY { radius: f32, half_height: f32 },
}

/// Build a Rapier collider from a `StaticBodyDef`.
///
/// The pose lives on the parent rigid-body, so the collider has an identity local transform.
pub fn collider_from_def(def: &StaticBodyDef) -> Collider {
    match &def.shape {
        ColliderShapeDef::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z).build()
        }

        ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => ColliderBuilder::cylinder(*half_height, *radius).build(),
    }
}
