//! Turn order and round progression.

use crate::state::{ledger::ArgumentLedger, room::Room};

const SEATS: usize = 2;

/// Where the room stands once an argument has been accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Player expected to submit next.
    pub next_turn: String,
    /// Round after the submission (unchanged when the round is still open).
    pub next_round: u8,
    /// Whether the last round has just been closed.
    pub completed: bool,
}

/// Decides whose turn it is and when a round closes.
#[derive(Debug, Clone, Copy)]
pub struct TurnScheduler {
    total_rounds: u8,
}

impl TurnScheduler {
    /// Scheduler for a debate lasting `total_rounds` rounds.
    pub fn new(total_rounds: u8) -> Self {
        Self { total_rounds }
    }

    /// Player one always opens the debate.
    pub fn opening_turn(room: &Room) -> String {
        room.player1.clone()
    }

    /// Compute the turn and round following a submission by `author`.
    ///
    /// `ledger` must already contain the new argument. Returns `None` when the
    /// room has no opponent seated for `author`.
    pub fn after_submission(
        &self,
        room: &Room,
        ledger: &ArgumentLedger,
        author: &str,
    ) -> Option<TurnOutcome> {
        let opponent = room.opponent_of(author)?.to_string();
        let round = room.current_round;

        // Each seat argues at most once per round.
        let round_closed = ledger.submissions_in_round(round) >= SEATS;

        if !round_closed {
            return Some(TurnOutcome {
                next_turn: opponent,
                next_round: round,
                completed: false,
            });
        }

        let next_round = round.saturating_add(1);
        if next_round > self.total_rounds {
            // Round and turn freeze on the last values once the debate ends.
            return Some(TurnOutcome {
                next_turn: opponent,
                next_round: round,
                completed: true,
            });
        }

        Some(TurnOutcome {
            next_turn: opponent,
            next_round,
            completed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::{Argument, RoomStatus, Topic};

    fn seated_room() -> Room {
        let mut room = Room::open(
            "ROOM1234".into(),
            Topic {
                id: "T1".into(),
                title: "Cats over dogs".into(),
                description: String::new(),
            },
            "alice".into(),
        );
        room.player2 = Some("bob".into());
        room.status = RoomStatus::InProgress;
        room.current_turn = Some("alice".into());
        room
    }

    #[test]
    fn turn_passes_to_opponent_within_a_round() {
        let scheduler = TurnScheduler::new(5);
        let room = seated_room();
        let mut ledger = ArgumentLedger::default();
        ledger.append(Argument::submitted("alice".into(), 1, "A1".into()));

        let outcome = scheduler.after_submission(&room, &ledger, "alice").unwrap();
        assert_eq!(outcome.next_turn, "bob");
        assert_eq!(outcome.next_round, 1);
        assert!(!outcome.completed);
    }

    #[test]
    fn round_advances_when_both_players_submitted() {
        let scheduler = TurnScheduler::new(5);
        let room = seated_room();
        let mut ledger = ArgumentLedger::default();
        ledger.append(Argument::submitted("alice".into(), 1, "A1".into()));
        ledger.append(Argument::submitted("bob".into(), 1, "B1".into()));

        let outcome = scheduler.after_submission(&room, &ledger, "bob").unwrap();
        assert_eq!(outcome.next_turn, "alice");
        assert_eq!(outcome.next_round, 2);
        assert!(!outcome.completed);
    }

    #[test]
    fn closing_the_last_round_completes() {
        let scheduler = TurnScheduler::new(1);
        let room = seated_room();
        let mut ledger = ArgumentLedger::default();
        ledger.append(Argument::submitted("alice".into(), 1, "A1".into()));
        ledger.append(Argument::submitted("bob".into(), 1, "B1".into()));

        let outcome = scheduler.after_submission(&room, &ledger, "bob").unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.next_round, 1);
    }

    #[test]
    fn no_outcome_without_an_opponent() {
        let scheduler = TurnScheduler::new(5);
        let room = Room::open(
            "ROOM1234".into(),
            Topic {
                id: "T1".into(),
                title: "t".into(),
                description: String::new(),
            },
            "alice".into(),
        );
        assert!(
            scheduler
                .after_submission(&room, &ArgumentLedger::default(), "alice")
                .is_none()
        );
    }
}
