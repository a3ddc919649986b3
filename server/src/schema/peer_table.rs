use spacetimedb::*;

/// Every client that ever joined, with its display name.
///
/// Rows outlive the connection so a returning player keeps their name.
#[table(name = peer, public)]
pub struct Peer {
    #[primary_key]
    pub identity: Identity,

    pub username: String,

    #[index(btree)]
    pub online: bool,
}
