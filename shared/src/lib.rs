//! Simulation core of the driving game: physics, the streamed world, the local car and
//! presence reconciliation. Rendering and networking live in the client and server crates.

pub mod cell;
pub mod config;
pub mod constants;
pub mod input;
pub mod leaderboard;
pub mod presence;
pub mod rapier;
pub mod rapier_world;
pub mod render;
pub mod session;
pub mod streamer;
pub mod tire_marks;
pub mod vehicle;

pub use cell::{RoadIndex, TileKey, road_index, tile_key};
pub use config::{ConfigError, GameConfig};
pub use input::InputIntent;
pub use leaderboard::LeaderboardEntry;
pub use presence::{
    ClientId, CollectibleStatus, CollisionImpact, MemoryHub, MemoryRoom, PresenceError,
    PresenceMap, PresencePatch, PresenceRecord, PresenceRoom, RoomStatePatch,
};
pub use rapier::{ColliderShapeDef, StaticBodyDef, collider_from_def};
pub use rapier_world::PhysicsWorld;
pub use render::{SceneCommand, VisualId, VisualKind};
pub use session::{FrameInput, FrameReport, SessionLoop};
pub use streamer::{BoostId, WorldStreamer};
pub use vehicle::{Telemetry, VehicleController, VehicleSnapshot};
