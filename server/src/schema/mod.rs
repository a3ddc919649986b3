mod boost_state_table;
mod peer_table;
mod presence_table;

pub use boost_state_table::*;
pub use peer_table::*;
pub use presence_table::*;
