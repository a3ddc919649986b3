//! The "highest jumps" board built from the presence mapping.

use crate::constants::DEFAULT_USERNAME;
use crate::presence::{ClientId, PresenceMap, PresenceRoom};

/// One row of the "highest jumps" board.
#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardEntry {
    pub client: ClientId,
    pub username: String,
    pub max_height: f32,
    pub max_air_time: f32,
    pub is_local: bool,
}

impl LeaderboardEntry {
    /// `"12.3m (1.4s)"`
    pub fn summary(&self) -> String {
        format!("{:.1}m ({:.1}s)", self.max_height, self.max_air_time)
    }
}

/// Every client in `presence`, highest jump first.
pub fn leaderboard(presence: &PresenceMap, room: &dyn PresenceRoom) -> Vec<LeaderboardEntry> {
    let local = room.client_id();
    let mut entries: Vec<LeaderboardEntry> = presence
        .iter()
        .map(|(client, record)| LeaderboardEntry {
            client: client.clone(),
            username: room
                .username(client)
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            max_height: record.max_height.unwrap_or(0.0),
            max_air_time: record.max_air_time.unwrap_or(0.0),
            is_local: client == local,
        })
        .collect();
    entries.sort_by(|a, b| b.max_height.total_cmp(&a.max_height));
    entries
}
