//! Cumulative player statistics, fed exclusively by debate settlements.

use std::{cmp::Ordering, time::SystemTime};

use dashmap::DashMap;

use crate::{
    dao::models::{HistoryEntryEntity, PlayerEntity},
    state::scoring::{DebateResult, Settlement},
};

/// One settled debate as seen by a player.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub room_key: String,
    pub topic: String,
    pub opponent: String,
    pub result: DebateResult,
    pub score: f64,
    pub settled_at: SystemTime,
}

/// Statistics of a single player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStats {
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_score: f64,
    /// Settled debates, oldest first.
    pub history: Vec<HistoryEntry>,
}

impl PlayerStats {
    fn new(username: String) -> Self {
        Self {
            username,
            wins: 0,
            losses: 0,
            draws: 0,
            total_score: 0.0,
            history: Vec::new(),
        }
    }

    fn ranks_before(&self, other: &Self) -> Ordering {
        other
            .total_score
            .total_cmp(&self.total_score)
            .then_with(|| other.wins.cmp(&self.wins))
            .then_with(|| self.username.cmp(&other.username))
    }
}

/// In-memory board of every player that finished at least one debate.
#[derive(Default)]
pub struct PlayerBoard {
    players: DashMap<String, PlayerStats>,
}

impl PlayerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted records, replacing whatever was cached for the same names.
    pub fn hydrate(&self, entities: impl IntoIterator<Item = PlayerEntity>) {
        for entity in entities {
            let stats = PlayerStats::from(entity);
            self.players.insert(stats.username.clone(), stats);
        }
    }

    /// Fold a settlement into both players' statistics and return the updated records.
    pub fn apply_settlement(&self, settlement: &Settlement, settled_at: SystemTime) -> Vec<PlayerStats> {
        settlement
            .lines
            .iter()
            .map(|line| {
                let mut entry = self
                    .players
                    .entry(line.player.clone())
                    .or_insert_with(|| PlayerStats::new(line.player.clone()));
                let stats = entry.value_mut();

                if line.won {
                    stats.wins += 1;
                } else if line.lost {
                    stats.losses += 1;
                } else if line.result == DebateResult::Draw {
                    stats.draws += 1;
                }
                stats.total_score += line.score;
                stats.history.push(HistoryEntry {
                    room_key: settlement.room_key.clone(),
                    topic: settlement.topic.clone(),
                    opponent: line.opponent.clone(),
                    result: line.result,
                    score: line.score,
                    settled_at,
                });

                stats.clone()
            })
            .collect()
    }

    pub fn get(&self, username: &str) -> Option<PlayerStats> {
        self.players.get(username).map(|entry| entry.value().clone())
    }

    /// 1-based position by total score, then wins, then name.
    ///
    /// Computed on every call; nothing is stored.
    pub fn ranking_of(&self, username: &str) -> Option<usize> {
        let target = self.get(username)?;
        let ahead = self
            .players
            .iter()
            .filter(|entry| entry.value().ranks_before(&target) == Ordering::Less)
            .count();
        Some(ahead + 1)
    }
}

impl From<PlayerEntity> for PlayerStats {
    fn from(entity: PlayerEntity) -> Self {
        Self {
            username: entity.username,
            wins: entity.wins,
            losses: entity.losses,
            draws: entity.draws,
            total_score: entity.total_score,
            history: entity
                .history
                .into_iter()
                .map(|entry| HistoryEntry {
                    room_key: entry.room_key,
                    topic: entry.topic,
                    opponent: entry.opponent,
                    result: entry.result,
                    score: entry.score,
                    settled_at: entry.settled_at,
                })
                .collect(),
        }
    }
}

impl From<PlayerStats> for PlayerEntity {
    fn from(stats: PlayerStats) -> Self {
        Self {
            username: stats.username,
            wins: stats.wins,
            losses: stats.losses,
            draws: stats.draws,
            total_score: stats.total_score,
            history: stats
                .history
                .into_iter()
                .map(|entry| HistoryEntryEntity {
                    room_key: entry.room_key,
                    topic: entry.topic,
                    opponent: entry.opponent,
                    result: entry.result,
                    score: entry.score,
                    settled_at: entry.settled_at,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::scoring::SettlementLine;

    fn settlement(key: &str, alice: f64, bob: f64, result: (DebateResult, DebateResult)) -> Settlement {
        let winner = match alice.total_cmp(&bob) {
            Ordering::Greater => Some("alice".to_string()),
            Ordering::Less => Some("bob".to_string()),
            Ordering::Equal => None,
        };
        let line = |player: &str, opponent: &str, score: f64, result| SettlementLine {
            player: player.into(),
            opponent: opponent.into(),
            score,
            won: winner.as_deref() == Some(player),
            lost: winner.as_deref() == Some(opponent),
            result,
        };
        Settlement {
            room_key: key.into(),
            topic: "Remote work".into(),
            winner: winner.clone(),
            lines: [
                line("alice", "bob", alice, result.0),
                line("bob", "alice", bob, result.1),
            ],
        }
    }

    #[test]
    fn settlement_updates_both_players() {
        let board = PlayerBoard::new();
        let updated = board.apply_settlement(
            &settlement("R1", 12.0, 7.0, (DebateResult::Win, DebateResult::Loss)),
            SystemTime::UNIX_EPOCH,
        );

        assert_eq!(updated.len(), 2);
        let alice = board.get("alice").unwrap();
        assert_eq!((alice.wins, alice.losses, alice.draws), (1, 0, 0));
        assert_eq!(alice.total_score, 12.0);
        assert_eq!(alice.history[0].opponent, "bob");

        let bob = board.get("bob").unwrap();
        assert_eq!((bob.wins, bob.losses), (0, 1));
        assert_eq!(bob.history[0].result, DebateResult::Loss);
    }

    #[test]
    fn aborted_debate_still_counts_the_winner() {
        let board = PlayerBoard::new();
        board.apply_settlement(
            &settlement("R1", 0.0, -30.0, (DebateResult::Aborted, DebateResult::Aborted)),
            SystemTime::UNIX_EPOCH,
        );

        let bob = board.get("bob").unwrap();
        assert_eq!(bob.losses, 1);
        assert_eq!(bob.total_score, -30.0);
        assert_eq!(bob.history[0].result, DebateResult::Aborted);
    }

    #[test]
    fn ranking_orders_by_score_then_wins() {
        let board = PlayerBoard::new();
        board.apply_settlement(
            &settlement("R1", 20.0, 5.0, (DebateResult::Win, DebateResult::Loss)),
            SystemTime::UNIX_EPOCH,
        );
        board.apply_settlement(
            &settlement("R2", 4.0, 4.0, (DebateResult::Draw, DebateResult::Draw)),
            SystemTime::UNIX_EPOCH,
        );

        assert_eq!(board.ranking_of("alice"), Some(1));
        assert_eq!(board.ranking_of("bob"), Some(2));
        assert_eq!(board.get("bob").unwrap().draws, 1);
        assert_eq!(board.ranking_of("carol"), None);
    }

    #[test]
    fn hydrated_records_round_trip_to_entities() {
        let board = PlayerBoard::new();
        board.apply_settlement(
            &settlement("R1", 3.0, 1.0, (DebateResult::Win, DebateResult::Loss)),
            SystemTime::UNIX_EPOCH,
        );
        let entity = PlayerEntity::from(board.get("alice").unwrap());

        let restored = PlayerBoard::new();
        restored.hydrate([entity]);
        assert_eq!(restored.get("alice"), board.get("alice"));
    }
}
