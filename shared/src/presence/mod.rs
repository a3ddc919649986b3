//! Replicated per-client presence and room-wide collectible state.
//!
//! Each client owns exactly one presence record and is its only writer. Writes are partial
//! patches: every field is optional and a present field overwrites the stored one.
//! Patches are validated before they are merged; a rejected patch leaves the record as is.

mod room;
mod sync;

pub use room::{MemoryHub, MemoryRoom, PresenceRoom};
pub use sync::{PresenceSync, ReconcileReport, RemoteVehicleProxy};

use std::collections::BTreeMap;
use std::fmt;

use rapier3d::na::{Quaternion, UnitQuaternion, Vector3};

use crate::constants::WHEEL_COUNT;
use crate::streamer::BoostId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelPose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

/// Informational notice that the publisher hit another car hard.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionImpact {
    pub with_client: ClientId,
    /// Relative speed at first contact (m/s).
    pub speed: f32,
    pub timestamp_ms: u64,
}

/// Partial presence update as it arrives from a publisher.
///
/// Rotations are raw quaternions here; they are normalized when merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresencePatch {
    pub position: Option<Vector3<f32>>,
    pub rotation: Option<Quaternion<f32>>,
    pub linvel: Option<Vector3<f32>>,
    pub angvel: Option<Vector3<f32>>,
    pub wheel_positions: Option<Vec<Vector3<f32>>>,
    pub wheel_rotations: Option<Vec<Quaternion<f32>>>,
    pub acceleration_modifier: Option<f32>,
    pub color_index: Option<u32>,
    /// km/h.
    pub top_speed: Option<f32>,
    pub max_height: Option<f32>,
    pub max_air_time: Option<f32>,
    pub current_height: Option<f32>,
    pub collision: Option<CollisionImpact>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PresenceError {
    NonFinite(&'static str),
    DegenerateRotation(&'static str),
    WheelCount { field: &'static str, got: usize },
    NonPositiveModifier(f32),
    Negative(&'static str),
}

impl fmt::Display for PresenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceError::NonFinite(field) => write!(f, "{field} has a non-finite component"),
            PresenceError::DegenerateRotation(field) => {
                write!(f, "{field} is not a valid rotation")
            }
            PresenceError::WheelCount { field, got } => {
                write!(f, "{field} needs {WHEEL_COUNT} entries, got {got}")
            }
            PresenceError::NonPositiveModifier(v) => {
                write!(f, "accelerationModifier must be positive, got {v}")
            }
            PresenceError::Negative(field) => write!(f, "{field} must not be negative"),
        }
    }
}

impl std::error::Error for PresenceError {}

fn check_vec(v: &Vector3<f32>, field: &'static str) -> Result<(), PresenceError> {
    if v.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(PresenceError::NonFinite(field))
    }
}

fn check_quat(q: &Quaternion<f32>, field: &'static str) -> Result<(), PresenceError> {
    if !q.coords.iter().all(|c| c.is_finite()) {
        return Err(PresenceError::NonFinite(field));
    }
    if q.norm() < 1.0e-6 {
        return Err(PresenceError::DegenerateRotation(field));
    }
    Ok(())
}

fn check_scalar(v: f32, field: &'static str) -> Result<(), PresenceError> {
    if !v.is_finite() {
        return Err(PresenceError::NonFinite(field));
    }
    if v < 0.0 {
        return Err(PresenceError::Negative(field));
    }
    Ok(())
}

impl PresencePatch {
    pub fn is_empty(&self) -> bool {
        *self == PresencePatch::default()
    }

    pub fn validate(&self) -> Result<(), PresenceError> {
        if let Some(p) = &self.position {
            check_vec(p, "position")?;
        }
        if let Some(q) = &self.rotation {
            check_quat(q, "quaternion")?;
        }
        if let Some(v) = &self.linvel {
            check_vec(v, "velocity")?;
        }
        if let Some(v) = &self.angvel {
            check_vec(v, "angularVelocity")?;
        }
        if let Some(ws) = &self.wheel_positions {
            if ws.len() != WHEEL_COUNT {
                return Err(PresenceError::WheelCount {
                    field: "wheelPositions",
                    got: ws.len(),
                });
            }
            for w in ws {
                check_vec(w, "wheelPositions")?;
            }
        }
        if let Some(ws) = &self.wheel_rotations {
            if ws.len() != WHEEL_COUNT {
                return Err(PresenceError::WheelCount {
                    field: "wheelQuaternions",
                    got: ws.len(),
                });
            }
            for w in ws {
                check_quat(w, "wheelQuaternions")?;
            }
        }
        if let Some(m) = self.acceleration_modifier {
            if !m.is_finite() {
                return Err(PresenceError::NonFinite("accelerationModifier"));
            }
            if m <= 0.0 {
                return Err(PresenceError::NonPositiveModifier(m));
            }
        }
        if let Some(v) = self.top_speed {
            check_scalar(v, "topSpeed")?;
        }
        if let Some(v) = self.max_height {
            check_scalar(v, "maxHeight")?;
        }
        if let Some(v) = self.max_air_time {
            check_scalar(v, "maxAirTime")?;
        }
        if let Some(v) = self.current_height {
            if !v.is_finite() {
                return Err(PresenceError::NonFinite("currentHeight"));
            }
        }
        if let Some(c) = &self.collision {
            check_scalar(c.speed, "collision.speed")?;
        }
        Ok(())
    }
}

/// Merged view of one client's presence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PresenceRecord {
    pub position: Option<Vector3<f32>>,
    pub rotation: Option<UnitQuaternion<f32>>,
    pub linvel: Option<Vector3<f32>>,
    pub angvel: Option<Vector3<f32>>,
    pub wheel_positions: Option<[Vector3<f32>; WHEEL_COUNT]>,
    pub wheel_rotations: Option<[UnitQuaternion<f32>; WHEEL_COUNT]>,
    pub acceleration_modifier: Option<f32>,
    pub color_index: Option<u32>,
    pub top_speed: Option<f32>,
    pub max_height: Option<f32>,
    pub max_air_time: Option<f32>,
    pub current_height: Option<f32>,
    pub collision: Option<CollisionImpact>,
}

impl PresenceRecord {
    /// Validate `patch` and merge it field by field.
    pub fn apply(&mut self, patch: PresencePatch) -> Result<(), PresenceError> {
        patch.validate()?;

        if let Some(p) = patch.position {
            self.position = Some(p);
        }
        if let Some(q) = patch.rotation {
            self.rotation = Some(UnitQuaternion::from_quaternion(q));
        }
        if let Some(v) = patch.linvel {
            self.linvel = Some(v);
        }
        if let Some(v) = patch.angvel {
            self.angvel = Some(v);
        }
        if let Some(ws) = patch.wheel_positions {
            let mut out = [Vector3::zeros(); WHEEL_COUNT];
            for (slot, w) in out.iter_mut().zip(ws) {
                *slot = w;
            }
            self.wheel_positions = Some(out);
        }
        if let Some(ws) = patch.wheel_rotations {
            let mut out = [UnitQuaternion::identity(); WHEEL_COUNT];
            for (slot, w) in out.iter_mut().zip(ws) {
                *slot = UnitQuaternion::from_quaternion(w);
            }
            self.wheel_rotations = Some(out);
        }
        if patch.acceleration_modifier.is_some() {
            self.acceleration_modifier = patch.acceleration_modifier;
        }
        if patch.color_index.is_some() {
            self.color_index = patch.color_index;
        }
        if patch.top_speed.is_some() {
            self.top_speed = patch.top_speed;
        }
        if patch.max_height.is_some() {
            self.max_height = patch.max_height;
        }
        if patch.max_air_time.is_some() {
            self.max_air_time = patch.max_air_time;
        }
        if patch.current_height.is_some() {
            self.current_height = patch.current_height;
        }
        if patch.collision.is_some() {
            self.collision = patch.collision;
        }
        Ok(())
    }

    /// Wheel poses, when both halves have been published.
    pub fn wheels(&self) -> Option<[WheelPose; WHEEL_COUNT]> {
        let (positions, rotations) = (self.wheel_positions?, self.wheel_rotations?);
        let mut out = [WheelPose {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }; WHEEL_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            slot.position = positions[i];
            slot.rotation = rotations[i];
        }
        Some(out)
    }
}

/// Every client's presence, keyed by client id.
pub type PresenceMap = BTreeMap<ClientId, PresenceRecord>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectibleStatus {
    pub collected: bool,
    pub collected_by: ClientId,
}

/// Partial update of room-wide state. Entries overwrite, last writer wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoomStatePatch {
    pub collectables: BTreeMap<BoostId, CollectibleStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_touches_present_fields() {
        let mut rec = PresenceRecord::default();
        rec.apply(PresencePatch {
            position: Some(Vector3::new(1.0, 2.0, 3.0)),
            color_index: Some(4),
            top_speed: Some(0.0),
            ..Default::default()
        })
        .unwrap();
        rec.apply(PresencePatch {
            max_height: Some(7.5),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(rec.position, Some(Vector3::new(1.0, 2.0, 3.0)));
        assert_eq!(rec.color_index, Some(4));
        assert_eq!(rec.max_height, Some(7.5));
        assert_eq!(rec.rotation, None);
    }

    #[test]
    fn invalid_patch_is_rejected_whole() {
        let mut rec = PresenceRecord::default();
        let err = rec
            .apply(PresencePatch {
                position: Some(Vector3::new(5.0, 0.0, 0.0)),
                wheel_positions: Some(vec![Vector3::zeros(); 3]),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(
            err,
            PresenceError::WheelCount {
                field: "wheelPositions",
                got: 3
            }
        );
        assert_eq!(rec, PresenceRecord::default());
    }

    #[test]
    fn validation_catches_bad_numbers() {
        let nan = PresencePatch {
            linvel: Some(Vector3::new(f32::NAN, 0.0, 0.0)),
            ..Default::default()
        };
        assert_eq!(nan.validate(), Err(PresenceError::NonFinite("velocity")));

        let zero_rot = PresencePatch {
            rotation: Some(Quaternion::new(0.0, 0.0, 0.0, 0.0)),
            ..Default::default()
        };
        assert!(matches!(zero_rot.validate(), Err(PresenceError::DegenerateRotation(_))));

        let modifier = PresencePatch {
            acceleration_modifier: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(modifier.validate(), Err(PresenceError::NonPositiveModifier(_))));

        let height = PresencePatch {
            max_height: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(height.validate(), Err(PresenceError::Negative("maxHeight")));
    }

    #[test]
    fn rotations_are_normalized_on_merge() {
        let mut rec = PresenceRecord::default();
        rec.apply(PresencePatch {
            rotation: Some(Quaternion::new(2.0, 0.0, 0.0, 0.0)),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(rec.rotation, Some(UnitQuaternion::identity()));
    }

    #[test]
    fn wheels_need_both_halves() {
        let mut rec = PresenceRecord::default();
        rec.apply(PresencePatch {
            wheel_positions: Some(vec![Vector3::new(1.0, 0.0, 0.0); WHEEL_COUNT]),
            ..Default::default()
        })
        .unwrap();
        assert!(rec.wheels().is_none());

        rec.apply(PresencePatch {
            wheel_rotations: Some(vec![Quaternion::identity(); WHEEL_COUNT]),
            ..Default::default()
        })
        .unwrap();
        let wheels = rec.wheels().expect("wheels");
        assert_eq!(wheels[3].position.x, 1.0);
    }
}
