use spacetimedb::{Identity, Timestamp};

/// A hard hit between the publisher's car and another client's car.
///
/// Informational only; the physics response already happened on the publisher.
#[derive(spacetimedb::SpacetimeType, Debug, Clone, Copy, PartialEq)]
pub struct DbCollision {
    pub with_identity: Identity,
    /// Relative speed at first contact (m/s).
    pub speed: f32,
    /// Server time at which the notice was accepted.
    pub timestamp: Timestamp,
}
