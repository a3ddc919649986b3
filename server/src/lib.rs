mod reducers {
    mod connection;
    pub mod collect_boost;
    pub mod set_username;
    pub mod update_presence;
}
pub mod schema;
pub mod types;

use crate::schema::*;
use spacetimedb::*;

/// Presence is session-scoped: nothing published before a restart is still live.
#[reducer(init)]
pub fn init(ctx: &ReducerContext) {
    let stale: Vec<Identity> = ctx.db.presence().iter().map(|p| p.identity).collect();
    for identity in &stale {
        ctx.db.presence().identity().delete(identity);
    }
    let online: Vec<Peer> = ctx.db.peer().online().filter(true).collect();
    for peer in online {
        ctx.db.peer().identity().update(Peer {
            online: false,
            ..peer
        });
    }
    log::info!("room initialized, cleared {} stale presence rows", stale.len());
}
