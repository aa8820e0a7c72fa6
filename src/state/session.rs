use crate::{
    dao::models::RoomEntity,
    state::{
        ledger::ArgumentLedger,
        room::{Argument, Penalty, Room},
        scoring::{self, Scoreboard},
    },
};

/// Aggregate owned by a room's state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct DebateSession {
    /// Seats, turn and round.
    pub room: Room,
    /// Submissions in order.
    pub ledger: ArgumentLedger,
    /// Penalty applied on abort.
    pub penalty: Option<Penalty>,
    /// Whether the player statistics have been settled for this room.
    pub settled: bool,
    /// Incremented on every committed transition.
    pub version: u64,
}

impl DebateSession {
    /// Fresh session around a newly opened room.
    pub fn new(room: Room) -> Self {
        Self {
            room,
            ledger: ArgumentLedger::default(),
            penalty: None,
            settled: false,
            version: 0,
        }
    }

    /// Point-in-time read model including the aggregated totals.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room: self.room.clone(),
            arguments: self.ledger.entries().to_vec(),
            scores: scoring::scoreboard(&self.room, &self.ledger, self.penalty.as_ref()),
            winner: self
                .settled
                .then(|| scoring::winner(&self.room, &self.ledger, self.penalty.as_ref()))
                .flatten(),
            penalty: self.penalty.clone(),
            pending_evaluations: self.ledger.pending_evaluations(),
            settled: self.settled,
            version: self.version,
        }
    }
}

/// Consistent read of a room handed to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    /// Room header.
    pub room: Room,
    /// Ledger entries in submission order.
    pub arguments: Vec<Argument>,
    /// Totals recomputed at read time.
    pub scores: Scoreboard,
    /// Winner, fixed once the room is settled; `None` before that or on equal totals.
    pub winner: Option<String>,
    /// Abort penalty, if any.
    pub penalty: Option<Penalty>,
    /// Arguments still awaiting the evaluator.
    pub pending_evaluations: usize,
    /// Whether the player statistics have been settled.
    pub settled: bool,
    /// Version of the committed state this snapshot was taken from.
    pub version: u64,
}

impl From<RoomEntity> for DebateSession {
    fn from(entity: RoomEntity) -> Self {
        Self {
            room: entity.room,
            ledger: ArgumentLedger::from_entries(entity.arguments),
            penalty: entity.penalty,
            settled: entity.settled,
            version: entity.version,
        }
    }
}

impl From<DebateSession> for RoomEntity {
    fn from(session: DebateSession) -> Self {
        Self {
            key: session.room.key.clone(),
            arguments: session.ledger.entries().to_vec(),
            room: session.room,
            penalty: session.penalty,
            settled: session.settled,
            version: session.version,
        }
    }
}
