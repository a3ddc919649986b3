//! Merge-patch of the caller's presence row.
//!
//! The update is validated in full before anything is written, so a rejected update leaves
//! the row untouched. Collision notices are stamped with the server time.

use crate::schema::*;
use crate::types::{DbCollision, PresenceUpdate};
use shared::presence::PresencePatch;
use spacetimedb::{ReducerContext, Table, Timestamp};

#[spacetimedb::reducer]
pub fn update_presence(ctx: &ReducerContext, update: PresenceUpdate) -> Result<(), String> {
    if ctx.db.peer().identity().find(ctx.sender).is_none() {
        return Err("Peer not found".into());
    }
    if let Err(err) = PresencePatch::from(&update).validate() {
        log::warn!("rejected presence from {:?}: {err}", ctx.sender);
        return Err(err.to_string());
    }
    if let Some(c) = &update.collision {
        if c.with_identity == ctx.sender {
            return Err("Cannot collide with yourself".into());
        }
    }

    match ctx.db.presence().identity().find(ctx.sender) {
        Some(mut row) => {
            merge(&mut row, update, ctx.timestamp);
            ctx.db.presence().identity().update(row);
        }
        None => {
            let mut row = Presence::empty(ctx.sender, ctx.timestamp);
            merge(&mut row, update, ctx.timestamp);
            ctx.db.presence().insert(row);
        }
    }
    Ok(())
}

fn merge(row: &mut Presence, update: PresenceUpdate, now: Timestamp) {
    let PresenceUpdate {
        position,
        rotation,
        linvel,
        angvel,
        wheel_positions,
        wheel_rotations,
        acceleration_modifier,
        color_index,
        top_speed,
        max_height,
        max_air_time,
        current_height,
        collision,
    } = update;

    if position.is_some() {
        row.position = position;
    }
    if rotation.is_some() {
        row.rotation = rotation;
    }
    if linvel.is_some() {
        row.linvel = linvel;
    }
    if angvel.is_some() {
        row.angvel = angvel;
    }
    if wheel_positions.is_some() {
        row.wheel_positions = wheel_positions;
    }
    if wheel_rotations.is_some() {
        row.wheel_rotations = wheel_rotations;
    }
    if acceleration_modifier.is_some() {
        row.acceleration_modifier = acceleration_modifier;
    }
    if color_index.is_some() {
        row.color_index = color_index;
    }
    if top_speed.is_some() {
        row.top_speed = top_speed;
    }
    if max_height.is_some() {
        row.max_height = max_height;
    }
    if max_air_time.is_some() {
        row.max_air_time = max_air_time;
    }
    if current_height.is_some() {
        row.current_height = current_height;
    }
    if let Some(c) = collision {
        log::info!(
            "{:?} hit {:?} at {:.2} m/s",
            row.identity,
            c.with_identity,
            c.speed
        );
        row.collision = Some(DbCollision {
            with_identity: c.with_identity,
            speed: c.speed,
            timestamp: now,
        });
    }
    row.updated_at = now;
}
