//! Running totals, winner resolution and end-of-debate settlement.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{
    ledger::ArgumentLedger,
    room::{Penalty, Room, RoomStatus},
};

/// Per-seat totals for a room.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scoreboard {
    /// Total of the creator.
    pub player1: f64,
    /// Total of the opponent (zero while the seat is empty).
    pub player2: f64,
}

/// Final classification of a player in a settled debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DebateResult {
    /// Strictly higher total.
    Win,
    /// Strictly lower total.
    Loss,
    /// Equal totals.
    Draw,
    /// The debate ended early; the result label does not depend on the totals.
    Aborted,
}

/// Per-player line of a settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementLine {
    /// Player concerned.
    pub player: String,
    /// Opponent faced.
    pub opponent: String,
    /// Session total, penalty included.
    pub score: f64,
    /// Whether this player has the strictly higher total.
    pub won: bool,
    /// Whether this player has the strictly lower total.
    pub lost: bool,
    /// Label recorded in the player's history.
    pub result: DebateResult,
}

/// Outcome of a terminated debate, handed to the player board exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    /// Room being settled.
    pub room_key: String,
    /// Topic title, kept for the player history.
    pub topic: String,
    /// Winner by strict total comparison.
    pub winner: Option<String>,
    /// Lines for both players (creator first).
    pub lines: [SettlementLine; 2],
}

/// Sum of the non-null scores of `player`, minus the penalty if they aborted.
pub fn total_for(ledger: &ArgumentLedger, penalty: Option<&Penalty>, player: &str) -> f64 {
    let deduction = penalty
        .filter(|penalty| penalty.player == player)
        .map(|penalty| penalty.points)
        .unwrap_or(0.0);
    ledger.score_of(player) - deduction
}

/// Totals for both seats.
pub fn scoreboard(room: &Room, ledger: &ArgumentLedger, penalty: Option<&Penalty>) -> Scoreboard {
    Scoreboard {
        player1: total_for(ledger, penalty, &room.player1),
        player2: room
            .player2
            .as_deref()
            .map(|player2| total_for(ledger, penalty, player2))
            .unwrap_or(0.0),
    }
}

/// Winner of a terminal room; `None` while the room is open or on equal totals.
pub fn winner(room: &Room, ledger: &ArgumentLedger, penalty: Option<&Penalty>) -> Option<String> {
    if !room.status.is_terminal() {
        return None;
    }
    let player2 = room.player2.as_deref()?;
    let totals = scoreboard(room, ledger, penalty);

    if totals.player1 > totals.player2 {
        Some(room.player1.clone())
    } else if totals.player2 > totals.player1 {
        Some(player2.to_string())
    } else {
        None
    }
}

/// Build the settlement of a terminal room.
///
/// Returns `None` for open rooms or rooms missing an opponent.
pub fn settle(room: &Room, ledger: &ArgumentLedger, penalty: Option<&Penalty>) -> Option<Settlement> {
    if !room.status.is_terminal() {
        return None;
    }
    let player2 = room.player2.clone()?;
    let totals = scoreboard(room, ledger, penalty);
    let winner = winner(room, ledger, penalty);
    let aborted = room.status == RoomStatus::Aborted;

    let line = |player: &str, opponent: &str, score: f64| {
        let won = winner.as_deref() == Some(player);
        let lost = winner.as_deref() == Some(opponent);
        let result = if aborted {
            DebateResult::Aborted
        } else if won {
            DebateResult::Win
        } else if lost {
            DebateResult::Loss
        } else {
            DebateResult::Draw
        };
        SettlementLine {
            player: player.to_string(),
            opponent: opponent.to_string(),
            score,
            won,
            lost,
            result,
        }
    };

    let lines = [
        line(&room.player1, &player2, totals.player1),
        line(&player2, &room.player1, totals.player2),
    ];

    Some(Settlement {
        room_key: room.key.clone(),
        topic: room.topic.title.clone(),
        winner,
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::{Argument, Topic};

    fn finished_room(status: RoomStatus) -> Room {
        let mut room = Room::open(
            "ROOM0001".into(),
            Topic {
                id: "T1".into(),
                title: "Remote work".into(),
                description: String::new(),
            },
            "alice".into(),
        );
        room.player2 = Some("bob".into());
        room.current_turn = Some("alice".into());
        room.status = status;
        room
    }

    fn scored_ledger(alice: f64, bob: f64) -> ArgumentLedger {
        let mut ledger = ArgumentLedger::default();
        let a = ledger.append(Argument::submitted("alice".into(), 1, "A1".into()));
        let b = ledger.append(Argument::submitted("bob".into(), 1, "B1".into()));
        ledger.record_score(a, alice).unwrap();
        ledger.record_score(b, bob).unwrap();
        ledger
    }

    #[test]
    fn strictly_higher_total_wins() {
        let room = finished_room(RoomStatus::Completed);
        let ledger = scored_ledger(8.0, 6.5);

        assert_eq!(winner(&room, &ledger, None).as_deref(), Some("alice"));
        let settlement = settle(&room, &ledger, None).unwrap();
        assert_eq!(settlement.lines[0].result, DebateResult::Win);
        assert_eq!(settlement.lines[1].result, DebateResult::Loss);
    }

    #[test]
    fn equal_totals_are_a_draw() {
        let room = finished_room(RoomStatus::Completed);
        let ledger = scored_ledger(5.0, 5.0);

        assert_eq!(winner(&room, &ledger, None), None);
        let settlement = settle(&room, &ledger, None).unwrap();
        assert!(settlement.lines.iter().all(|l| l.result == DebateResult::Draw));
        assert!(settlement.lines.iter().all(|l| !l.won && !l.lost));
    }

    #[test]
    fn penalty_counts_against_the_aborting_player() {
        let room = finished_room(RoomStatus::Aborted);
        let ledger = scored_ledger(10.0, 30.0);
        let penalty = Penalty {
            player: "bob".into(),
            points: 30.0,
        };

        let totals = scoreboard(&room, &ledger, Some(&penalty));
        assert_eq!(totals.player1, 10.0);
        assert_eq!(totals.player2, 0.0);
        assert_eq!(winner(&room, &ledger, Some(&penalty)).as_deref(), Some("alice"));

        let settlement = settle(&room, &ledger, Some(&penalty)).unwrap();
        assert!(settlement.lines[0].won);
        assert!(settlement.lines[1].lost);
        assert_eq!(settlement.lines[1].result, DebateResult::Aborted);
    }

    #[test]
    fn no_winner_while_open() {
        let room = finished_room(RoomStatus::InProgress);
        let ledger = scored_ledger(9.0, 1.0);

        assert_eq!(winner(&room, &ledger, None), None);
        assert!(settle(&room, &ledger, None).is_none());
    }
}
