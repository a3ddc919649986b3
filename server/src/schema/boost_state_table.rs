use spacetimedb::*;

/// Room-wide collected flag for a boost.
///
/// Last writer wins: a later pickup of the same id overwrites `collected_by`.
#[table(name = boost_state, public)]
pub struct BoostState {
    #[primary_key]
    pub boost_id: u64,

    pub collected: bool,
    pub collected_by: Identity,
    pub updated_at: Timestamp,
}
