use crate::schema::*;
use spacetimedb::ReducerContext;

const MAX_USERNAME_LEN: usize = 24;

#[spacetimedb::reducer]
pub fn set_username(ctx: &ReducerContext, username: String) -> Result<(), String> {
    let username = username.trim();
    if username.is_empty() {
        return Err("Username is empty".into());
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(format!("Username is longer than {MAX_USERNAME_LEN} characters"));
    }
    let Some(peer) = ctx.db.peer().identity().find(ctx.sender) else {
        return Err("Peer not found".into());
    };

    log::info!("{:?} is now {username}", ctx.sender);
    ctx.db.peer().identity().update(Peer {
        username: username.to_string(),
        ..peer
    });
    Ok(())
}
