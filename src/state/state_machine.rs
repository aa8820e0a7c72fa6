use std::time::{Instant, SystemTime};

use thiserror::Error;
use uuid::Uuid;

use crate::state::{
    ledger::LedgerError,
    room::{Argument, DebateRules, Penalty, RoomStatus, Topic},
    scheduler::TurnScheduler,
    scoring::{self, Settlement},
    session::{DebateSession, RoomSnapshot},
};

/// Events that can be applied to a room.
#[derive(Debug, Clone, PartialEq)]
pub enum DebateEvent {
    /// A second player takes the free seat.
    Join {
        /// Name of the joining player.
        player: String,
    },
    /// The player holding the turn submits an argument.
    Submit {
        /// Author of the argument.
        player: String,
        /// Raw argument text.
        content: String,
    },
    /// A participant leaves the debate early.
    Abort {
        /// Player leaving.
        player: String,
    },
    /// The evaluator answered for one argument (`None` when it gave up).
    Evaluated {
        /// Ledger index of the argument.
        index: usize,
        /// Score, or `None` when the evaluation failed for good.
        score: Option<f64>,
    },
}

impl DebateEvent {
    fn action(&self) -> &'static str {
        match self {
            DebateEvent::Join { .. } => "join",
            DebateEvent::Submit { .. } => "submit an argument",
            DebateEvent::Abort { .. } => "abort",
            DebateEvent::Evaluated { .. } => "record an evaluation",
        }
    }
}

/// Reasons an event is rejected by the room rules.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    /// The event is not allowed in the current status.
    #[error("cannot {action} while the room is {status:?}")]
    InvalidState {
        /// Status of the room when the event arrived.
        status: RoomStatus,
        /// Human readable action that was attempted.
        action: &'static str,
    },
    /// Both seats are already taken.
    #[error("room already has two players")]
    AlreadyFull,
    /// The event contradicts the current seating or ledger.
    #[error("{0}")]
    Conflict(String),
    /// Someone else holds the turn.
    #[error("it is not {got}'s turn")]
    NotYourTurn {
        /// Player holding the turn.
        expected: Option<String>,
        /// Player who tried to submit.
        got: String,
    },
    /// Blank argument after trimming.
    #[error("argument must not be empty")]
    EmptyArgument,
    /// Argument above the configured limit.
    #[error("argument is {length} characters long (max {max})")]
    ArgumentTooLong {
        /// Length of the submitted argument in characters.
        length: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The player does not hold a seat in this room.
    #[error("player `{0}` is not part of this room")]
    NotParticipant(String),
    /// Evaluation could not be recorded.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors that can occur when planning a room transition.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The event was rejected by the room rules.
    Rejected(TransitionError),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Room status changed since the plan was created.
    StatusMismatch {
        /// Status when the plan was created.
        expected: RoomStatus,
        /// Current status.
        actual: RoomStatus,
    },
    /// Room version changed since the plan was created.
    VersionMismatch {
        /// Version the plan expects to produce.
        expected: u64,
        /// Version the room would reach instead.
        actual: u64,
    },
}

/// Errors that can occur when discarding a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// Argument handed to the evaluator once a submission is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    /// Room the argument belongs to.
    pub room_key: String,
    /// Ledger index of the argument.
    pub index: usize,
    /// Topic under debate.
    pub topic: Topic,
    /// Round of the argument.
    pub round: u8,
    /// Argument text.
    pub content: String,
}

/// Side effects to run once a plan has been applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    /// Evaluation to dispatch for a freshly submitted argument.
    pub evaluation: Option<EvaluationRequest>,
    /// Player statistics to settle, produced at most once per room.
    pub settlement: Option<Settlement>,
    /// Arguments still pending when the last round closed; they must resolve
    /// before the room can settle.
    pub awaiting_evaluations: Vec<usize>,
}

/// A validated transition that has not been committed yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Status the room is in when planning.
    pub from: RoomStatus,
    /// Session as it will be once applied.
    pub next: DebateSession,
    /// Event that triggered this transition.
    pub event: DebateEvent,
    /// Version number after applying this transition.
    pub version_next: u64,
    /// Work to run after the commit.
    pub effects: Effects,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Result of a committed transition.
#[derive(Debug, Clone)]
pub struct Applied {
    /// State right after the commit.
    pub snapshot: RoomSnapshot,
    /// Follow-up work for the caller.
    pub effects: Effects,
}

/// State machine owning a single room.
///
/// Transitions run in two steps: [`plan`](Self::plan) validates an event and
/// computes the next session without exposing it, [`apply`](Self::apply)
/// commits it. Readers only ever observe committed sessions.
#[derive(Debug, Clone)]
pub struct DebateStateMachine {
    session: DebateSession,
    rules: DebateRules,
    pending: Option<Plan>,
}

impl DebateStateMachine {
    /// Wrap an existing session.
    pub fn new(session: DebateSession, rules: DebateRules) -> Self {
        Self {
            session,
            rules,
            pending: None,
        }
    }

    /// Committed session.
    pub fn session(&self) -> &DebateSession {
        &self.session
    }

    /// Current status of the room.
    pub fn status(&self) -> RoomStatus {
        self.session.room.status
    }

    /// Snapshot of the committed state.
    pub fn snapshot(&self) -> RoomSnapshot {
        self.session.snapshot()
    }

    /// Plan a transition by validating that the event can be applied to the committed session.
    pub fn plan(&mut self, event: DebateEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let (mut next, mut effects) = self
            .compute_transition(&event)
            .map_err(PlanError::Rejected)?;

        let version_next = self.session.version + 1;
        next.version = version_next;
        next.room.updated_at = SystemTime::now();

        if next.room.status.is_terminal() && !next.settled && settlement_due(&next) {
            effects.settlement =
                scoring::settle(&next.room, &next.ledger, next.penalty.as_ref());
            next.settled = true;
        }

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.session.room.status,
            next,
            event,
            version_next,
            effects,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Commit a planned transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<Applied, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.session.room.status != plan.from {
            return Err(ApplyError::StatusMismatch {
                expected: plan.from,
                actual: self.session.room.status,
            });
        }

        if self.session.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.session.version + 1,
            });
        }

        self.session = plan.next;

        Ok(Applied {
            snapshot: self.session.snapshot(),
            effects: plan.effects,
        })
    }

    /// Discard a planned transition, leaving the committed session untouched.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(
        &self,
        event: &DebateEvent,
    ) -> Result<(DebateSession, Effects), TransitionError> {
        let current = &self.session;
        let status = current.room.status;
        let invalid_state = || TransitionError::InvalidState {
            status,
            action: event.action(),
        };

        let mut next = current.clone();
        let mut effects = Effects::default();

        match event {
            DebateEvent::Join { player } => {
                if status.is_terminal() {
                    return Err(invalid_state());
                }
                if current.room.player2.is_some() {
                    return Err(TransitionError::AlreadyFull);
                }
                if status != RoomStatus::Waiting {
                    return Err(invalid_state());
                }
                if current.room.player1 == *player {
                    return Err(TransitionError::Conflict(format!(
                        "player `{player}` already created this room"
                    )));
                }

                next.room.player2 = Some(player.clone());
                next.room.status = RoomStatus::InProgress;
                next.room.current_turn = Some(TurnScheduler::opening_turn(&next.room));
            }
            DebateEvent::Submit { player, content } => {
                if status != RoomStatus::InProgress {
                    return Err(invalid_state());
                }
                if current.room.current_turn.as_deref() != Some(player.as_str()) {
                    return Err(TransitionError::NotYourTurn {
                        expected: current.room.current_turn.clone(),
                        got: player.clone(),
                    });
                }

                let content = content.trim();
                if content.is_empty() {
                    return Err(TransitionError::EmptyArgument);
                }
                let length = content.chars().count();
                if length > self.rules.max_argument_chars {
                    return Err(TransitionError::ArgumentTooLong {
                        length,
                        max: self.rules.max_argument_chars,
                    });
                }

                let round = current.room.current_round;
                if current.ledger.has_submitted(player, round) {
                    return Err(TransitionError::Conflict(format!(
                        "player `{player}` already argued in round {round}"
                    )));
                }

                let index = next.ledger.append(Argument::submitted(
                    player.clone(),
                    round,
                    content.to_string(),
                ));

                let outcome = TurnScheduler::new(self.rules.total_rounds)
                    .after_submission(&next.room, &next.ledger, player)
                    .ok_or_else(|| TransitionError::NotParticipant(player.clone()))?;

                next.room.current_turn = Some(outcome.next_turn);
                next.room.current_round = outcome.next_round;
                if outcome.completed {
                    next.room.status = RoomStatus::Completed;
                    effects.awaiting_evaluations = next.ledger.pending_indices();
                }

                effects.evaluation = Some(EvaluationRequest {
                    room_key: next.room.key.clone(),
                    index,
                    topic: next.room.topic.clone(),
                    round,
                    content: content.to_string(),
                });
            }
            DebateEvent::Abort { player } => {
                if status != RoomStatus::InProgress {
                    return Err(invalid_state());
                }
                if !current.room.is_participant(player) {
                    return Err(TransitionError::NotParticipant(player.clone()));
                }

                next.penalty = Some(Penalty {
                    player: player.clone(),
                    points: self.rules.abort_penalty,
                });
                next.room.status = RoomStatus::Aborted;
            }
            DebateEvent::Evaluated { index, score } => {
                // Arguments left pending by an abort stay unresolved.
                if status == RoomStatus::Aborted {
                    return Err(invalid_state());
                }
                match score {
                    Some(score) => next.ledger.record_score(*index, *score)?,
                    None => next.ledger.record_failure(*index)?,
                }
            }
        }

        Ok((next, effects))
    }
}

/// Aborted rooms settle right away; completed rooms wait for their last evaluation.
fn settlement_due(session: &DebateSession) -> bool {
    match session.room.status {
        RoomStatus::Aborted => true,
        RoomStatus::Completed => session.ledger.pending_evaluations() == 0,
        RoomStatus::Waiting | RoomStatus::InProgress => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::Room;

    fn machine() -> DebateStateMachine {
        let room = Room::open(
            "ABCD2345".into(),
            Topic {
                id: "T1".into(),
                title: "Homework should be banned".into(),
                description: String::new(),
            },
            "alice".into(),
        );
        DebateStateMachine::new(DebateSession::new(room), DebateRules::default())
    }

    fn apply(sm: &mut DebateStateMachine, event: DebateEvent) -> Applied {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    fn reject(sm: &mut DebateStateMachine, event: DebateEvent) -> TransitionError {
        match sm.plan(event) {
            Err(PlanError::Rejected(err)) => err,
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    fn join(player: &str) -> DebateEvent {
        DebateEvent::Join {
            player: player.into(),
        }
    }

    fn submit(player: &str, content: &str) -> DebateEvent {
        DebateEvent::Submit {
            player: player.into(),
            content: content.into(),
        }
    }

    fn abort(player: &str) -> DebateEvent {
        DebateEvent::Abort {
            player: player.into(),
        }
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = machine();
        let snapshot = sm.snapshot();
        assert_eq!(snapshot.room.status, RoomStatus::Waiting);
        assert_eq!(snapshot.room.current_turn, None);
        assert_eq!(snapshot.room.current_round, 1);
        assert_eq!(snapshot.version, 0);
    }

    #[test]
    fn join_seats_opponent_and_gives_turn_to_creator() {
        let mut sm = machine();
        let applied = apply(&mut sm, join("bob"));

        assert_eq!(applied.snapshot.room.status, RoomStatus::InProgress);
        assert_eq!(applied.snapshot.room.player2.as_deref(), Some("bob"));
        assert_eq!(applied.snapshot.room.current_turn.as_deref(), Some("alice"));
        assert_eq!(applied.snapshot.version, 1);
    }

    #[test]
    fn join_rejections() {
        let mut sm = machine();
        assert!(matches!(
            reject(&mut sm, join("alice")),
            TransitionError::Conflict(_)
        ));
        apply(&mut sm, join("bob"));
        assert_eq!(reject(&mut sm, join("carol")), TransitionError::AlreadyFull);
    }

    #[test]
    fn join_on_a_finished_room_is_an_invalid_state() {
        let mut sm = machine();
        apply(&mut sm, join("bob"));
        apply(&mut sm, abort("bob"));
        assert_eq!(
            reject(&mut sm, join("carol")),
            TransitionError::InvalidState {
                status: RoomStatus::Aborted,
                action: "join",
            }
        );

        let mut sm = DebateStateMachine::new(machine().session().clone(), DebateRules {
            total_rounds: 1,
            ..DebateRules::default()
        });
        apply(&mut sm, join("bob"));
        apply(&mut sm, submit("alice", "A1"));
        apply(&mut sm, submit("bob", "B1"));
        assert_eq!(
            reject(&mut sm, join("carol")),
            TransitionError::InvalidState {
                status: RoomStatus::Completed,
                action: "join",
            }
        );
    }

    #[test]
    fn full_debate_alternates_turns_and_completes() {
        let mut sm = machine();
        apply(&mut sm, join("bob"));

        let mut evaluations = 0;
        for round in 1..=5u8 {
            for (player, other) in [("alice", "bob"), ("bob", "alice")] {
                let before = sm.snapshot();
                assert_eq!(before.room.status, RoomStatus::InProgress);
                assert_eq!(before.room.current_round, round);
                assert_eq!(before.room.current_turn.as_deref(), Some(player));

                let applied = apply(&mut sm, submit(player, &format!("{player} r{round}")));
                assert!(applied.effects.evaluation.is_some());
                evaluations += 1;

                if applied.snapshot.room.status == RoomStatus::InProgress {
                    assert_eq!(applied.snapshot.room.current_turn.as_deref(), Some(other));
                }
            }
        }

        let done = sm.snapshot();
        assert_eq!(evaluations, 10);
        assert_eq!(done.room.status, RoomStatus::Completed);
        assert_eq!(done.room.current_round, 5);
        assert_eq!(done.arguments.len(), 10);
        assert!(!done.settled);
        assert_eq!(
            reject(&mut sm, submit("alice", "one more")),
            TransitionError::InvalidState {
                status: RoomStatus::Completed,
                action: "submit an argument",
            }
        );
    }

    #[test]
    fn out_of_turn_submission_leaves_ledger_untouched() {
        let mut sm = machine();
        apply(&mut sm, join("bob"));
        let before = sm.snapshot();

        let err = reject(&mut sm, submit("bob", "I go first"));
        assert_eq!(
            err,
            TransitionError::NotYourTurn {
                expected: Some("alice".into()),
                got: "bob".into(),
            }
        );
        assert_eq!(sm.snapshot(), before);
    }

    #[test]
    fn turn_check_precedes_content_validation() {
        let mut sm = machine();
        apply(&mut sm, join("bob"));

        assert!(matches!(
            reject(&mut sm, submit("bob", "   ")),
            TransitionError::NotYourTurn { .. }
        ));
        assert_eq!(
            reject(&mut sm, submit("alice", "   ")),
            TransitionError::EmptyArgument
        );
        let long = "x".repeat(1001);
        assert_eq!(
            reject(&mut sm, submit("alice", &long)),
            TransitionError::ArgumentTooLong {
                length: 1001,
                max: 1000
            }
        );
    }

    #[test]
    fn abort_applies_penalty_once_and_settles() {
        let mut sm = machine();
        apply(&mut sm, join("bob"));
        apply(&mut sm, submit("alice", "A1"));
        apply(&mut sm, submit("bob", "B1"));

        let applied = apply(&mut sm, abort("bob"));
        assert_eq!(applied.snapshot.room.status, RoomStatus::Aborted);
        assert_eq!(applied.snapshot.scores.player2, -30.0);
        assert_eq!(applied.snapshot.scores.player1, 0.0);
        assert_eq!(applied.snapshot.winner.as_deref(), Some("alice"));
        assert!(applied.snapshot.settled);
        assert!(applied.effects.settlement.is_some());

        assert!(matches!(
            reject(&mut sm, abort("bob")),
            TransitionError::InvalidState { .. }
        ));
        assert_eq!(sm.snapshot().scores.player2, -30.0);
    }

    #[test]
    fn pending_arguments_stay_unresolved_after_abort() {
        let mut sm = machine();
        apply(&mut sm, join("bob"));
        apply(&mut sm, submit("alice", "A1"));
        apply(&mut sm, abort("alice"));

        assert!(matches!(
            reject(
                &mut sm,
                DebateEvent::Evaluated {
                    index: 0,
                    score: Some(9.0)
                }
            ),
            TransitionError::InvalidState { .. }
        ));
        assert_eq!(sm.snapshot().pending_evaluations, 1);
    }

    #[test]
    fn abort_requires_a_participant_and_a_running_room() {
        let mut sm = machine();
        assert!(matches!(
            reject(&mut sm, abort("alice")),
            TransitionError::InvalidState { .. }
        ));
        apply(&mut sm, join("bob"));
        assert_eq!(
            reject(&mut sm, abort("mallory")),
            TransitionError::NotParticipant("mallory".into())
        );
    }

    #[test]
    fn completed_room_settles_with_last_evaluation() {
        let mut sm = DebateStateMachine::new(machine().session().clone(), DebateRules {
            total_rounds: 1,
            ..DebateRules::default()
        });
        apply(&mut sm, join("bob"));
        apply(&mut sm, submit("alice", "A1"));
        let closing = apply(&mut sm, submit("bob", "B1"));
        assert_eq!(closing.snapshot.room.status, RoomStatus::Completed);
        assert!(closing.effects.settlement.is_none());
        assert_eq!(closing.effects.awaiting_evaluations, vec![0, 1]);

        let first = apply(
            &mut sm,
            DebateEvent::Evaluated {
                index: 0,
                score: Some(4.0),
            },
        );
        assert!(first.effects.settlement.is_none());
        assert_eq!(first.snapshot.winner, None);

        let last = apply(
            &mut sm,
            DebateEvent::Evaluated {
                index: 1,
                score: None,
            },
        );
        let settlement = last.effects.settlement.expect("settlement");
        assert_eq!(settlement.winner.as_deref(), Some("alice"));
        assert!(last.snapshot.settled);
        assert_eq!(last.snapshot.winner.as_deref(), Some("alice"));

        assert_eq!(
            reject(
                &mut sm,
                DebateEvent::Evaluated {
                    index: 1,
                    score: Some(50.0),
                }
            ),
            TransitionError::Ledger(LedgerError::AlreadyEvaluated(1))
        );
        assert_eq!(sm.snapshot().winner.as_deref(), Some("alice"));
    }

    #[test]
    fn second_plan_is_refused_while_one_is_pending() {
        let mut sm = machine();
        let plan = sm.plan(join("bob")).unwrap();
        assert_eq!(sm.plan(join("carol")).unwrap_err(), PlanError::AlreadyPending);

        sm.abort(plan.id).unwrap();
        assert_eq!(sm.snapshot().room.status, RoomStatus::Waiting);
        assert!(sm.pending.is_none());
    }

    #[test]
    fn apply_with_wrong_id_keeps_pending_plan() {
        let mut sm = machine();
        let plan = sm.plan(join("bob")).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));

        sm.apply(plan.id).unwrap();
        assert_eq!(sm.status(), RoomStatus::InProgress);
    }
}
