mod db_collision;
mod db_quat;
mod db_vec3;
mod presence_update;

pub use db_collision::DbCollision;
pub use db_quat::DbQuat;
pub use db_vec3::DbVec3;
pub use presence_update::{CollisionReport, PresenceUpdate, client_id};
