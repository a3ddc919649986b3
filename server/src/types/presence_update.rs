use crate::types::{DbQuat, DbVec3};
use shared::presence::{ClientId, CollisionImpact, PresencePatch};
use spacetimedb::Identity;

/// Partial presence record sent by a client. `None` leaves the stored field untouched.
#[derive(spacetimedb::SpacetimeType, Debug, Clone, Default, PartialEq)]
pub struct PresenceUpdate {
    pub position: Option<DbVec3>,
    pub rotation: Option<DbQuat>,
    pub linvel: Option<DbVec3>,
    pub angvel: Option<DbVec3>,
    pub wheel_positions: Option<Vec<DbVec3>>,
    pub wheel_rotations: Option<Vec<DbQuat>>,
    pub acceleration_modifier: Option<f32>,
    pub color_index: Option<u32>,
    pub top_speed: Option<f32>,
    pub max_height: Option<f32>,
    pub max_air_time: Option<f32>,
    pub current_height: Option<f32>,
    pub collision: Option<CollisionReport>,
}

/// Impact as reported by the publisher; the server stamps the time.
#[derive(spacetimedb::SpacetimeType, Debug, Clone, Copy, PartialEq)]
pub struct CollisionReport {
    pub with_identity: Identity,
    pub speed: f32,
}

/// Client ids on the wire are identities in hex.
pub fn client_id(identity: &Identity) -> ClientId {
    ClientId::new(identity.to_hex().to_string())
}

impl From<&PresenceUpdate> for PresencePatch {
    fn from(u: &PresenceUpdate) -> Self {
        PresencePatch {
            position: u.position.map(Into::into),
            rotation: u.rotation.map(Into::into),
            linvel: u.linvel.map(Into::into),
            angvel: u.angvel.map(Into::into),
            wheel_positions: u
                .wheel_positions
                .as_ref()
                .map(|ws| ws.iter().map(Into::into).collect()),
            wheel_rotations: u
                .wheel_rotations
                .as_ref()
                .map(|ws| ws.iter().map(Into::into).collect()),
            acceleration_modifier: u.acceleration_modifier,
            color_index: u.color_index,
            top_speed: u.top_speed,
            max_height: u.max_height,
            max_air_time: u.max_air_time,
            current_height: u.current_height,
            collision: u.collision.map(|c| CollisionImpact {
                with_client: client_id(&c.with_identity),
                speed: c.speed,
                timestamp_ms: 0,
            }),
        }
    }
}
