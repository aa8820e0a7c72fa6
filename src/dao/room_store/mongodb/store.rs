use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoPlayerDocument, MongoRoomDocument},
};
use crate::dao::{
    models::{PlayerEntity, RoomEntity},
    room_store::RoomStore,
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const PLAYER_COLLECTION_NAME: &str = "players";

/// MongoDB-backed [`RoomStore`] implementation.
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.players().await;
        let index = IndexModel::builder()
            .keys(doc! {"total_score": -1, "wins": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_ranking_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION_NAME,
                index: "total_score,wins",
                source,
            })?;

        Ok(())
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn save_room_document(&self, room: RoomEntity) -> MongoResult<()> {
        let key = room.key.clone();
        let document = MongoRoomDocument::from(room);
        self.rooms()
            .await
            .replace_one(doc! {"_id": key.as_str()}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { key, source })?;
        Ok(())
    }

    async fn find_room_document(&self, key: String) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .rooms()
            .await
            .find_one(doc! {"_id": key.as_str()})
            .await
            .map_err(|source| MongoDaoError::LoadRoom { key, source })?;
        Ok(document.map(Into::into))
    }

    async fn save_player_document(&self, player: PlayerEntity) -> MongoResult<()> {
        let username = player.username.clone();
        let document = MongoPlayerDocument::from(player);
        self.players()
            .await
            .replace_one(doc! {"_id": username.as_str()}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer { username, source })?;
        Ok(())
    }

    async fn find_player_document(&self, username: String) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .players()
            .await
            .find_one(doc! {"_id": username.as_str()})
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { username, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_player_documents(&self) -> MongoResult<Vec<PlayerEntity>> {
        let cursor = self
            .players()
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListPlayers { source })?;
        let documents: Vec<MongoPlayerDocument> = cursor
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPlayers { source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl RoomStore for MongoRoomStore {
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_room_document(room).await.map_err(Into::into) })
    }

    fn find_room(&self, key: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room_document(key).await.map_err(Into::into) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_player_document(player).await.map_err(Into::into) })
    }

    fn find_player(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_player_document(username)
                .await
                .map_err(Into::into)
        })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_player_documents().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.reconnect().await.map_err(Into::into) })
    }
}
