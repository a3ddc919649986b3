//! Connection lifecycle reducers.
//!
//! Behavior
//! - On connect: ensure a `Peer` row exists for the caller (default username) and mark it
//!   online. Presence is not created here; the client publishes its own first record.
//! - On disconnect: delete the caller's `Presence` row so peers tear down its car, and
//!   mark the `Peer` offline. Boost state is left as is.

use crate::schema::*;
use shared::constants::DEFAULT_USERNAME;
use spacetimedb::{ReducerContext, Table};

#[spacetimedb::reducer(client_connected)]
pub fn identity_connected(ctx: &ReducerContext) {
    log::info!("Client connected: {:?}", ctx.sender);

    if let Some(peer) = ctx.db.peer().identity().find(ctx.sender) {
        ctx.db.peer().identity().update(Peer {
            online: true,
            ..peer
        });
    } else {
        ctx.db.peer().insert(Peer {
            identity: ctx.sender,
            username: DEFAULT_USERNAME.to_string(),
            online: true,
        });
    }
}

#[spacetimedb::reducer(client_disconnected)]
pub fn identity_disconnected(ctx: &ReducerContext) {
    log::info!("Client disconnected: {:?}", ctx.sender);

    ctx.db.presence().identity().delete(ctx.sender);

    if let Some(peer) = ctx.db.peer().identity().find(ctx.sender) {
        ctx.db.peer().identity().update(Peer {
            online: false,
            ..peer
        });
    }
}
