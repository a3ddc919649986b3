use crate::module_bindings::{PresenceUpdate, Reducer};
use bevy_spacetimedb::RegisterReducerMessage;
use spacetimedb_sdk::ReducerEvent;

#[derive(Debug, RegisterReducerMessage)]
pub struct UpdatePresence {
    pub event: ReducerEvent<Reducer>,
    pub update: PresenceUpdate,
}

#[derive(Debug, RegisterReducerMessage)]
pub struct CollectBoost {
    pub event: ReducerEvent<Reducer>,
    pub boost_id: u64,
}

#[derive(Debug, RegisterReducerMessage)]
pub struct SetUsername {
    pub event: ReducerEvent<Reducer>,
    pub username: String,
}
