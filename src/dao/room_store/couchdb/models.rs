use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{PlayerEntity, RoomEntity};

use super::error::CouchDaoError;

pub const ROOM_PREFIX: &str = "room::";
pub const PLAYER_PREFIX: &str = "player::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Room aggregate stored as a single document keyed by `room::<KEY>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub room: RoomEntity,
}

impl CouchRoomDocument {
    pub fn from_entity(room: RoomEntity) -> Self {
        Self {
            id: room_doc_id(&room.key),
            rev: None,
            room,
        }
    }

    pub fn into_entity(self) -> RoomEntity {
        self.room
    }
}

/// Player statistics stored under `player::<NAME>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub player: PlayerEntity,
}

impl CouchPlayerDocument {
    pub fn from_entity(player: PlayerEntity) -> Self {
        Self {
            id: player_doc_id(&player.username),
            rev: None,
            player,
        }
    }

    /// Return the entity after checking the document ID matches the username.
    pub fn into_entity(self) -> Result<PlayerEntity, CouchDaoError> {
        let username = parse_player_doc_id(&self.id)?;
        if username != self.player.username {
            return Err(CouchDaoError::InvalidDocId {
                doc_id: self.id,
                kind: "username mismatch",
            });
        }
        Ok(self.player)
    }
}

pub fn room_doc_id(key: &str) -> String {
    format!("{ROOM_PREFIX}{key}")
}

pub fn player_doc_id(username: &str) -> String {
    format!("{PLAYER_PREFIX}{username}")
}

fn parse_player_doc_id(doc_id: &str) -> Result<&str, CouchDaoError> {
    doc_id
        .strip_prefix(PLAYER_PREFIX)
        .ok_or_else(|| CouchDaoError::InvalidDocId {
            doc_id: doc_id.to_string(),
            kind: "missing player prefix",
        })
}
