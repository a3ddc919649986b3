use crate::types::*;
use spacetimedb::*;

/// Replicated state of one client's car.
///
/// Written only by its own client through `update_presence`; every field stays `None`
/// until that client first publishes it. The row is removed on disconnect, which is how
/// peers learn that the car left.
#[table(name = presence, public)]
#[derive(Clone)]
pub struct Presence {
    #[primary_key]
    pub identity: Identity,

    pub position: Option<DbVec3>,
    pub rotation: Option<DbQuat>,
    pub linvel: Option<DbVec3>,
    pub angvel: Option<DbVec3>,

    /// Front pair first, then the rear pair.
    pub wheel_positions: Option<Vec<DbVec3>>,
    pub wheel_rotations: Option<Vec<DbQuat>>,

    pub acceleration_modifier: Option<f32>,
    pub color_index: Option<u32>,
    /// km/h
    pub top_speed: Option<f32>,
    pub max_height: Option<f32>,
    pub max_air_time: Option<f32>,
    pub current_height: Option<f32>,

    /// Latest hard hit against another car, if any.
    pub collision: Option<DbCollision>,

    pub updated_at: Timestamp,
}

impl Presence {
    pub fn empty(identity: Identity, now: Timestamp) -> Self {
        Self {
            identity,
            position: None,
            rotation: None,
            linvel: None,
            angvel: None,
            wheel_positions: None,
            wheel_rotations: None,
            acceleration_modifier: None,
            color_index: None,
            top_speed: None,
            max_height: None,
            max_air_time: None,
            current_height: None,
            collision: None,
            updated_at: now,
        }
    }
}
