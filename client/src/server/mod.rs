pub mod reducers;
pub mod types;

use crate::cli::LaunchOptions;
use crate::module_bindings::{
    DbConnection, Peer, PeerTableAccess, Presence, PresenceTableAccess,
    RemoteTables, set_username_reducer::set_username,
};
use crate::session::Session;
use bevy::prelude::*;
use bevy_spacetimedb::{
    ReadDeleteMessage, ReadInsertMessage, ReadStdbConnectedMessage, ReadUpdateMessage,
    StdbConnection, StdbPlugin,
};
use reducers::*;

pub type SpacetimeDB<'a> = Res<'a, StdbConnection<DbConnection>>;

/// Set whenever a presence or peer row changes; cleared when the session reads the room.
#[derive(Resource, Default)]
pub struct PresenceDirty(pub bool);

pub(super) fn plugin(app: &mut App, options: &LaunchOptions) {
    let stdb_plugin = StdbPlugin::default()
        .with_uri("http://127.0.0.1:3000")
        .with_module_name("drift-road");

    let stdb_plugin = if let Some(tok) = options.token.clone() {
        info!("Using JWT from CLI/ENV for SpacetimeDB connection.");
        stdb_plugin.with_token(tok)
    } else {
        warn!("No JWT provided via CLI/ENV; identity will be ephemeral for this run.");
        stdb_plugin
    };

    app.add_plugins(
        stdb_plugin
            // --------------------------------
            // Register all reducers
            // --------------------------------
            .add_reducer::<UpdatePresence>()
            .add_reducer::<CollectBoost>()
            .add_reducer::<SetUsername>()
            // --------------------------------
            // Register all tables
            // --------------------------------
            .add_table(RemoteTables::presence)
            .add_table(RemoteTables::peer)
            .add_table(RemoteTables::boost_state)
            .with_run_fn(DbConnection::run_threaded),
    );
    app.init_resource::<PresenceDirty>();
    app.add_systems(Update, (on_connect, mark_presence_dirty));
}

fn on_connect(
    mut commands: Commands,
    mut messages: ReadStdbConnectedMessage,
    stdb: SpacetimeDB,
    options: Res<LaunchOptions>,
) {
    for message in messages.read() {
        info!("SpacetimeDB module connected: {:?}", message.identity);

        stdb.subscription_builder().subscribe(vec![
            "SELECT * FROM presence",
            "SELECT * FROM peer",
            "SELECT * FROM boost_state",
        ]);

        if let Some(name) = &options.username {
            if let Err(err) = stdb.reducers().set_username(name.clone()) {
                warn!("Could not set username: {err}");
            }
        }

        let local = types::client_id(&message.identity);
        commands.insert_resource(Session::new(options.config.clone(), local));
    }
}

fn mark_presence_dirty(
    mut inserted: ReadInsertMessage<Presence>,
    mut updated: ReadUpdateMessage<Presence>,
    mut deleted: ReadDeleteMessage<Presence>,
    mut peers_inserted: ReadInsertMessage<Peer>,
    mut peers_updated: ReadUpdateMessage<Peer>,
    mut dirty: ResMut<PresenceDirty>,
) {
    let changes = inserted.read().count()
        + updated.read().count()
        + deleted.read().count()
        + peers_inserted.read().count()
        + peers_updated.read().count();
    if changes > 0 {
        dirty.0 = true;
    }
}
