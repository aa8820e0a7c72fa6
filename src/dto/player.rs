use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::format_system_time,
    state::{players::PlayerStats, scoring::DebateResult},
};

/// Cumulative statistics of a player.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerSummary {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_score: f64,
    /// 1-based position on the board, recomputed on every request.
    pub ranking: usize,
}

/// One finished debate in a player's history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DebateHistoryItem {
    /// Room key of the debate.
    pub id: String,
    pub topic: String,
    pub opponent: String,
    pub result: DebateResult,
    pub score: f64,
    /// RFC 3339 settlement date.
    pub date: String,
}

/// Response of `GET /player/history/{username}`; history is newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerStatsResponse {
    pub player: PlayerSummary,
    pub history: Vec<DebateHistoryItem>,
}

impl From<(PlayerStats, usize)> for PlayerStatsResponse {
    fn from((stats, ranking): (PlayerStats, usize)) -> Self {
        let history = stats
            .history
            .into_iter()
            .rev()
            .map(|entry| DebateHistoryItem {
                id: entry.room_key,
                topic: entry.topic,
                opponent: entry.opponent,
                result: entry.result,
                score: entry.score,
                date: format_system_time(entry.settled_at),
            })
            .collect();

        Self {
            player: PlayerSummary {
                username: stats.username,
                wins: stats.wins,
                losses: stats.losses,
                draws: stats.draws,
                total_score: stats.total_score,
                ranking,
            },
            history,
        }
    }
}
