use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a debate room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Created by player one, waiting for an opponent.
    Waiting,
    /// Both seats are taken and turns are being played.
    InProgress,
    /// Every round has been played.
    Completed,
    /// One of the players left early and took the penalty.
    Aborted,
}

impl RoomStatus {
    /// Whether the room reached one of its final states.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoomStatus::Completed | RoomStatus::Aborted)
    }
}

/// Topic metadata copied from the catalog when the room is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    /// Catalog identifier of the topic.
    pub id: String,
    /// Motion under debate.
    pub title: String,
    /// Longer framing shown to both players.
    pub description: String,
}

/// Tunable rules applied by the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebateRules {
    /// Number of rounds; each round is one argument per player.
    pub total_rounds: u8,
    /// Upper bound on argument length, counted in characters.
    pub max_argument_chars: usize,
    /// Points deducted from the player who aborts.
    pub abort_penalty: f64,
}

impl Default for DebateRules {
    fn default() -> Self {
        Self {
            total_rounds: 5,
            max_argument_chars: 1000,
            abort_penalty: 30.0,
        }
    }
}

/// Evaluation progress of a single argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// The evaluator has not answered yet.
    Pending,
    /// A score has been recorded.
    Scored,
    /// The evaluator gave up; the argument counts for zero.
    Failed,
}

/// A single submission inside the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Name of the author.
    pub player: String,
    /// Round the argument was submitted in (1-based).
    pub round: u8,
    /// Trimmed argument text.
    pub content: String,
    /// Score returned by the evaluator, if any.
    pub score: Option<f64>,
    /// Where the evaluation of this argument stands.
    pub evaluation: Evaluation,
    /// Submission timestamp.
    pub submitted_at: SystemTime,
}

impl Argument {
    /// Build a freshly submitted argument awaiting evaluation.
    pub fn submitted(player: String, round: u8, content: String) -> Self {
        Self {
            player,
            round,
            content,
            score: None,
            evaluation: Evaluation::Pending,
            submitted_at: SystemTime::now(),
        }
    }

    /// Whether the evaluator is still expected to answer for this argument.
    pub fn is_pending(&self) -> bool {
        self.evaluation == Evaluation::Pending
    }
}

/// Penalty recorded when a player aborts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    /// Player who aborted.
    pub player: String,
    /// Points deducted from that player's total.
    pub points: f64,
}

/// Room header: seats, turn and round bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Shareable room key.
    pub key: String,
    /// Topic picked by the creator.
    pub topic: Topic,
    /// Creator of the room; always moves first.
    pub player1: String,
    /// Opponent, once joined.
    pub player2: Option<String>,
    /// Round currently being played (1-based).
    pub current_round: u8,
    /// Player allowed to submit next.
    pub current_turn: Option<String>,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last committed mutation.
    pub updated_at: SystemTime,
}

impl Room {
    /// Open a new room seated by `creator`.
    pub fn open(key: String, topic: Topic, creator: String) -> Self {
        let now = SystemTime::now();
        Self {
            key,
            topic,
            player1: creator,
            player2: None,
            current_round: 1,
            current_turn: None,
            status: RoomStatus::Waiting,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `player` holds one of the two seats.
    pub fn is_participant(&self, player: &str) -> bool {
        self.player1 == player || self.player2.as_deref() == Some(player)
    }

    /// The seat facing `player`, if both seats are taken.
    pub fn opponent_of(&self, player: &str) -> Option<&str> {
        let player2 = self.player2.as_deref()?;
        if self.player1 == player {
            Some(player2)
        } else if player2 == player {
            Some(&self.player1)
        } else {
            None
        }
    }
}
