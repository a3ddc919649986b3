//! `PresenceRoom` over the SpacetimeDB connection.
//!
//! Writes become reducer calls and are fire-and-forget: a failed call is logged and
//! otherwise ignored. Reads come from the subscribed client cache.

use crate::module_bindings::{
    DbConnection, PeerTableAccess, PresenceTableAccess, collect_boost_reducer::collect_boost,
    update_presence_reducer::update_presence,
};
use crate::server::{
    PresenceDirty,
    types::{client_id, presence_record, presence_update},
};
use bevy::prelude::*;
use bevy_spacetimedb::StdbConnection;
use shared::presence::{
    ClientId, PresenceError, PresenceMap, PresencePatch, PresenceRoom, RoomStatePatch,
};
use spacetimedb_sdk::{Identity, Table};

pub struct StdbRoom<'a> {
    conn: &'a StdbConnection<DbConnection>,
    client_id: ClientId,
    dirty: &'a mut PresenceDirty,
}

impl<'a> StdbRoom<'a> {
    pub fn new(
        conn: &'a StdbConnection<DbConnection>,
        client_id: ClientId,
        dirty: &'a mut PresenceDirty,
    ) -> Self {
        Self {
            conn,
            client_id,
            dirty,
        }
    }

    fn identity_of(&self, client: &ClientId) -> Option<Identity> {
        self.conn
            .db()
            .peer()
            .iter()
            .map(|p| p.identity)
            .find(|identity| client_id(identity) == *client)
    }
}

impl PresenceRoom for StdbRoom<'_> {
    fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn update_presence(&mut self, patch: PresencePatch) -> Result<(), PresenceError> {
        patch.validate()?;
        let update = presence_update(&patch, |client| self.identity_of(client));
        if let Err(err) = self.conn.reducers().update_presence(update) {
            warn!("update_presence call failed: {err}");
        }
        Ok(())
    }

    fn update_room_state(&mut self, patch: RoomStatePatch) {
        for (id, status) in patch.collectables {
            if !status.collected {
                continue;
            }
            if let Err(err) = self.conn.reducers().collect_boost(id.0) {
                warn!("collect_boost call failed: {err}");
            }
        }
    }

    fn username(&self, client: &ClientId) -> Option<String> {
        self.conn
            .db()
            .peer()
            .iter()
            .find(|p| client_id(&p.identity) == *client)
            .map(|p| p.username)
    }

    fn poll_presence_change(&mut self) -> Option<PresenceMap> {
        if !self.dirty.0 {
            return None;
        }
        self.dirty.0 = false;

        let mut presence = PresenceMap::new();
        for row in self.conn.db().presence().iter() {
            match presence_record(&row) {
                Ok(record) => {
                    presence.insert(client_id(&row.identity), record);
                }
                Err(err) => warn!("Skipping invalid presence for {}: {err}", row.identity),
            }
        }
        Some(presence)
    }
}
