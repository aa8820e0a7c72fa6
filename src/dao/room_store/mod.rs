#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{PlayerEntity, RoomEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for rooms and player statistics.
pub trait RoomStore: Send + Sync {
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, key: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_player(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
