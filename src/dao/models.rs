use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::state::{
    room::{Argument, Penalty, Room},
    scoring::DebateResult,
};

/// Aggregate room entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomEntity {
    /// Primary key of the room (its shareable key).
    pub key: String,
    /// Room header: seats, topic, turn and round.
    pub room: Room,
    /// Ledger entries in submission order.
    pub arguments: Vec<Argument>,
    /// Abort penalty, if one was applied.
    pub penalty: Option<Penalty>,
    /// Whether the player statistics have been settled.
    pub settled: bool,
    /// Committed version of the room.
    pub version: u64,
}

/// Cumulative statistics of a player persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Unique player name.
    pub username: String,
    /// Debates won.
    pub wins: u32,
    /// Debates lost.
    pub losses: u32,
    /// Debates ended on equal totals.
    pub draws: u32,
    /// Sum of the player's session totals, penalties included.
    pub total_score: f64,
    /// Settled debates, oldest first.
    pub history: Vec<HistoryEntryEntity>,
}

/// One settled debate in a player's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntryEntity {
    /// Room the debate was played in.
    pub room_key: String,
    /// Topic title.
    pub topic: String,
    /// Opponent name.
    pub opponent: String,
    /// Outcome for this player.
    pub result: DebateResult,
    /// Session total of this player.
    pub score: f64,
    /// Settlement timestamp.
    pub settled_at: SystemTime,
}
