//! Process-local store used when no database backend is configured.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, ready};

use crate::dao::{
    models::{PlayerEntity, RoomEntity},
    room_store::RoomStore,
    storage::StorageResult,
};

/// Keeps every entity in memory; contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    rooms: Arc<DashMap<String, RoomEntity>>,
    players: Arc<DashMap<String, PlayerEntity>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomStore for MemoryRoomStore {
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let rooms = self.rooms.clone();
        Box::pin(async move {
            rooms.insert(room.key.clone(), room);
            Ok(())
        })
    }

    fn find_room(&self, key: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let room = self.rooms.get(&key).map(|entry| entry.value().clone());
        Box::pin(ready(Ok(room)))
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let players = self.players.clone();
        Box::pin(async move {
            players.insert(player.username.clone(), player);
            Ok(())
        })
    }

    fn find_player(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let player = self.players.get(&username).map(|entry| entry.value().clone());
        Box::pin(ready(Ok(player)))
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let players = self
            .players
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Box::pin(ready(Ok(players)))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }
}
