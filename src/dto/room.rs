//! DTO definitions for the room lifecycle routes and the status snapshot.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{catalog::TopicSummary, format_system_time, validation::validate_player_name},
    state::{
        ledger::ArgumentLedger,
        room::{Argument, Evaluation, Room, RoomStatus},
        session::RoomSnapshot,
    },
};

/// Body of `POST /create-room/{player}`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(min = 1, max = 64))]
    pub topic_id: String,
}

/// Body of `POST /join-room/{key}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinRoomRequest {
    pub player_name: String,
}

impl Validate for JoinRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_player_name(&self.player_name) {
            errors.add("player_name", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Body of `POST /submit-argument/{key}/{player}`.
///
/// Content rules are enforced by the room itself, after the turn check.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitArgumentRequest {
    pub argument: String,
}

/// Body of `POST /evaluations/{room_key}/{index}`: either a score or `failed: true`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EvaluationResultRequest {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub failed: bool,
}

impl Validate for EvaluationResultRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match (self.score, self.failed) {
            (Some(score), false) if !score.is_finite() => {
                let mut err = ValidationError::new("score_not_finite");
                err.message = Some("Score must be a finite number".into());
                errors.add("score", err);
            }
            (Some(_), false) | (None, true) => {}
            _ => {
                let mut err = ValidationError::new("score_or_failed");
                err.message = Some("Provide either a score or `failed: true`".into());
                errors.add("score", err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Room header as exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomResponse {
    pub room_key: String,
    pub topic: TopicSummary,
    pub player1: String,
    pub player2: Option<String>,
    pub current_round: u8,
    pub current_turn: Option<String>,
    pub status: RoomStatus,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

/// Single ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ArgumentSummary {
    pub player: String,
    pub content: String,
    pub round: u8,
    /// `null` until the evaluator answers.
    pub score: Option<f64>,
    pub evaluation: Evaluation,
    pub submitted_at: String,
}

/// Arguments of one round, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoundSummary {
    pub round: u8,
    pub arguments: Vec<ArgumentSummary>,
}

/// Running totals per seat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoresSummary {
    pub player1: f64,
    pub player2: f64,
}

/// Penalty taken by the player who aborted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PenaltySummary {
    pub player: String,
    pub points: f64,
}

/// Point-in-time view of a room returned by status, submit and abort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomStatusResponse {
    pub room: RoomResponse,
    pub topic: TopicSummary,
    /// Ledger in submission order.
    pub arguments: Vec<ArgumentSummary>,
    /// Same arguments grouped by round.
    pub rounds: Vec<RoundSummary>,
    pub scores: ScoresSummary,
    /// Set only once the room is settled and the totals differ.
    pub winner: Option<String>,
    pub penalty: Option<PenaltySummary>,
    pub pending_evaluations: usize,
    /// Player statistics were settled; totals and winner no longer change.
    pub settled: bool,
    pub version: u64,
}

impl RoomStatusResponse {
    /// Whether the room reached a final status.
    pub fn is_terminal(&self) -> bool {
        self.room.status.is_terminal()
    }

    /// Terminal and settled: nothing about the room will change anymore.
    pub fn is_final(&self) -> bool {
        self.is_terminal() && self.settled
    }
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self {
            room_key: room.key,
            topic: room.topic.into(),
            player1: room.player1,
            player2: room.player2,
            current_round: room.current_round,
            current_turn: room.current_turn,
            status: room.status,
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

impl From<&Argument> for ArgumentSummary {
    fn from(argument: &Argument) -> Self {
        Self {
            player: argument.player.clone(),
            content: argument.content.clone(),
            round: argument.round,
            score: argument.score,
            evaluation: argument.evaluation,
            submitted_at: format_system_time(argument.submitted_at),
        }
    }
}

impl From<RoomSnapshot> for RoomStatusResponse {
    fn from(snapshot: RoomSnapshot) -> Self {
        let ledger = ArgumentLedger::from_entries(snapshot.arguments);
        let rounds = ledger
            .by_round()
            .into_iter()
            .map(|(round, arguments)| RoundSummary {
                round,
                arguments: arguments.into_iter().map(ArgumentSummary::from).collect(),
            })
            .collect();
        let arguments = ledger
            .entries()
            .iter()
            .map(ArgumentSummary::from)
            .collect();

        Self {
            topic: snapshot.room.topic.clone().into(),
            room: snapshot.room.into(),
            arguments,
            rounds,
            scores: ScoresSummary {
                player1: snapshot.scores.player1,
                player2: snapshot.scores.player2,
            },
            winner: snapshot.winner,
            penalty: snapshot.penalty.map(|penalty| PenaltySummary {
                player: penalty.player,
                points: penalty.points,
            }),
            pending_evaluations: snapshot.pending_evaluations,
            settled: snapshot.settled,
            version: snapshot.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        room::{DebateRules, Topic},
        session::DebateSession,
        state_machine::{DebateEvent, DebateStateMachine},
    };

    #[test]
    fn join_request_rejects_blank_names() {
        let request = JoinRoomRequest {
            player_name: " ".into(),
        };
        assert!(request.validate().is_err());
        let request = JoinRoomRequest {
            player_name: "bob".into(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn evaluation_result_needs_exactly_one_outcome() {
        let ok = |score, failed| EvaluationResultRequest { score, failed }.validate().is_ok();
        assert!(ok(Some(7.0), false));
        assert!(ok(None, true));
        assert!(!ok(None, false));
        assert!(!ok(Some(7.0), true));
        assert!(!ok(Some(f64::NAN), false));
    }

    #[test]
    fn status_groups_arguments_by_round() {
        let room = Room::open(
            "DTO00001".into(),
            Topic {
                id: "T1".into(),
                title: "Cats over dogs".into(),
                description: String::new(),
            },
            "alice".into(),
        );
        let mut sm = DebateStateMachine::new(DebateSession::new(room), DebateRules::default());
        for event in [
            DebateEvent::Join {
                player: "bob".into(),
            },
            DebateEvent::Submit {
                player: "alice".into(),
                content: "A1".into(),
            },
            DebateEvent::Submit {
                player: "bob".into(),
                content: "B1".into(),
            },
            DebateEvent::Submit {
                player: "alice".into(),
                content: "A2".into(),
            },
        ] {
            let plan = sm.plan(event).unwrap();
            sm.apply(plan.id).unwrap();
        }

        let response = RoomStatusResponse::from(sm.snapshot());
        assert_eq!(response.room.room_key, "DTO00001");
        assert_eq!(response.arguments.len(), 3);
        assert_eq!(response.rounds.len(), 2);
        assert_eq!(response.rounds[0].arguments.len(), 2);
        assert_eq!(response.rounds[1].arguments[0].content, "A2");
        assert_eq!(response.room.current_turn.as_deref(), Some("bob"));
        assert!(!response.is_terminal());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["room"]["status"], "in_progress");
        assert_eq!(json["arguments"][0]["score"], serde_json::Value::Null);
    }
}
