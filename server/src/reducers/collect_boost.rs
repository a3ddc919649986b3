use crate::schema::*;
use spacetimedb::{ReducerContext, Table};

/// Flag a boost as collected by the caller.
///
/// Last writer wins: an already-collected boost is claimed again by whoever wrote last.
#[spacetimedb::reducer]
pub fn collect_boost(ctx: &ReducerContext, boost_id: u64) -> Result<(), String> {
    if ctx.db.peer().identity().find(ctx.sender).is_none() {
        return Err("Peer not found".into());
    }

    let row = BoostState {
        boost_id,
        collected: true,
        collected_by: ctx.sender,
        updated_at: ctx.timestamp,
    };
    match ctx.db.boost_state().boost_id().find(boost_id) {
        Some(previous) => {
            if previous.collected_by != ctx.sender {
                log::debug!(
                    "boost {boost_id} re-claimed by {:?} over {:?}",
                    ctx.sender,
                    previous.collected_by
                );
            }
            ctx.db.boost_state().boost_id().update(row);
        }
        None => {
            ctx.db.boost_state().insert(row);
        }
    }
    Ok(())
}
