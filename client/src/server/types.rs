//! Conversions between generated row types and the simulation's types.

use crate::module_bindings::{CollisionReport, DbQuat, DbVec3, Presence, PresenceUpdate};
use nalgebra as na;
use shared::presence::{ClientId, CollisionImpact, PresenceError, PresencePatch, PresenceRecord};
use spacetimedb_sdk::Identity;

/// Client ids are identities in hex, the same on every client and in the module.
pub fn client_id(identity: &Identity) -> ClientId {
    ClientId::new(identity.to_hex().to_string())
}

impl From<DbVec3> for na::Vector3<f32> {
    fn from(v: DbVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}
impl From<&DbVec3> for na::Vector3<f32> {
    fn from(v: &DbVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<&na::Vector3<f32>> for DbVec3 {
    fn from(v: &na::Vector3<f32>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<&DbQuat> for na::Quaternion<f32> {
    fn from(q: &DbQuat) -> Self {
        na::Quaternion::new(q.w, q.x, q.y, q.z)
    }
}

impl From<&na::Quaternion<f32>> for DbQuat {
    fn from(q: &na::Quaternion<f32>) -> Self {
        DbQuat {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

/// Wire form of a local patch. A collision against a client with no known identity is dropped.
pub fn presence_update(
    patch: &PresencePatch,
    identity_of: impl Fn(&ClientId) -> Option<Identity>,
) -> PresenceUpdate {
    PresenceUpdate {
        position: patch.position.as_ref().map(Into::into),
        rotation: patch.rotation.as_ref().map(Into::into),
        linvel: patch.linvel.as_ref().map(Into::into),
        angvel: patch.angvel.as_ref().map(Into::into),
        wheel_positions: patch
            .wheel_positions
            .as_ref()
            .map(|ws| ws.iter().map(Into::into).collect()),
        wheel_rotations: patch
            .wheel_rotations
            .as_ref()
            .map(|ws| ws.iter().map(Into::into).collect()),
        acceleration_modifier: patch.acceleration_modifier,
        color_index: patch.color_index,
        top_speed: patch.top_speed,
        max_height: patch.max_height,
        max_air_time: patch.max_air_time,
        current_height: patch.current_height,
        collision: patch.collision.as_ref().and_then(|c| {
            identity_of(&c.with_client).map(|with_identity| CollisionReport {
                with_identity,
                speed: c.speed,
            })
        }),
    }
}

/// Typed record of a replicated row, validated the same way local patches are.
pub fn presence_record(row: &Presence) -> Result<PresenceRecord, PresenceError> {
    let patch = PresencePatch {
        position: row.position.as_ref().map(Into::into),
        rotation: row.rotation.as_ref().map(Into::into),
        linvel: row.linvel.as_ref().map(Into::into),
        angvel: row.angvel.as_ref().map(Into::into),
        wheel_positions: row
            .wheel_positions
            .as_ref()
            .map(|ws| ws.iter().map(Into::into).collect()),
        wheel_rotations: row
            .wheel_rotations
            .as_ref()
            .map(|ws| ws.iter().map(Into::into).collect()),
        acceleration_modifier: row.acceleration_modifier,
        color_index: row.color_index,
        top_speed: row.top_speed,
        max_height: row.max_height,
        max_air_time: row.max_air_time,
        current_height: row.current_height,
        collision: row.collision.as_ref().map(|c| CollisionImpact {
            with_client: client_id(&c.with_identity),
            speed: c.speed,
            timestamp_ms: (c.timestamp.to_micros_since_unix_epoch() / 1000).max(0) as u64,
        }),
    };
    let mut record = PresenceRecord::default();
    record.apply(patch)?;
    Ok(record)
}
