use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::{
    dao::models::{HistoryEntryEntity, PlayerEntity, RoomEntity},
    state::{
        room::{Argument, Penalty, Room},
        scoring::DebateResult,
    },
};

/// Room aggregate as stored in the `rooms` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    key: String,
    room: Room,
    arguments: Vec<Argument>,
    penalty: Option<Penalty>,
    #[serde(default)]
    settled: bool,
    version: i64,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            key: value.key,
            room: value.room,
            arguments: value.arguments,
            penalty: value.penalty,
            settled: value.settled,
            version: i64::try_from(value.version).unwrap_or(i64::MAX),
        }
    }
}

impl From<MongoRoomDocument> for RoomEntity {
    fn from(value: MongoRoomDocument) -> Self {
        Self {
            key: value.key,
            room: value.room,
            arguments: value.arguments,
            penalty: value.penalty,
            settled: value.settled,
            version: u64::try_from(value.version).unwrap_or_default(),
        }
    }
}

/// Player statistics as stored in the `players` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    username: String,
    wins: u32,
    losses: u32,
    #[serde(default)]
    draws: u32,
    total_score: f64,
    #[serde(default)]
    history: Vec<MongoHistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoHistoryEntry {
    room_key: String,
    topic: String,
    opponent: String,
    result: DebateResult,
    score: f64,
    settled_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            username: value.username,
            wins: value.wins,
            losses: value.losses,
            draws: value.draws,
            total_score: value.total_score,
            history: value
                .history
                .into_iter()
                .map(|entry| MongoHistoryEntry {
                    room_key: entry.room_key,
                    topic: entry.topic,
                    opponent: entry.opponent,
                    result: entry.result,
                    score: entry.score,
                    settled_at: DateTime::from_system_time(entry.settled_at),
                })
                .collect(),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            username: value.username,
            wins: value.wins,
            losses: value.losses,
            draws: value.draws,
            total_score: value.total_score,
            history: value
                .history
                .into_iter()
                .map(|entry| HistoryEntryEntity {
                    room_key: entry.room_key,
                    topic: entry.topic,
                    opponent: entry.opponent,
                    result: entry.result,
                    score: entry.score,
                    settled_at: entry.settled_at.to_system_time(),
                })
                .collect(),
        }
    }
}
