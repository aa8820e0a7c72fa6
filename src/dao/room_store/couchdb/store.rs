use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;

use crate::dao::{
    models::{PlayerEntity, RoomEntity},
    room_store::RoomStore,
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchPlayerDocument, CouchRoomDocument, END_SUFFIX, PLAYER_PREFIX,
        player_doc_id, room_doc_id,
    },
};

#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRoomStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{prefix}\"")),
            ("endkey", format!("\"{prefix}{END_SUFFIX}\"")),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })
            })
            .collect()
    }
}

impl RoomStore for CouchRoomStore {
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = room_doc_id(&room.key);
            let mut doc = CouchRoomDocument::from_entity(room);
            if let Some(existing) = store.get_document::<CouchRoomDocument>(&doc_id).await? {
                doc.rev = existing.rev;
            }
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn find_room(&self, key: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = room_doc_id(&key);
            let maybe_doc = store.get_document::<CouchRoomDocument>(&doc_id).await?;
            Ok(maybe_doc.map(CouchRoomDocument::into_entity))
        })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = player_doc_id(&player.username);
            let mut doc = CouchPlayerDocument::from_entity(player);
            if let Some(existing) = store.get_document::<CouchPlayerDocument>(&doc_id).await? {
                doc.rev = existing.rev;
            }
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn find_player(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = player_doc_id(&username);
            match store.get_document::<CouchPlayerDocument>(&doc_id).await? {
                Some(doc) => Ok(Some(doc.into_entity()?)),
                None => Ok(None),
            }
        })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchPlayerDocument>(PLAYER_PREFIX)
                .await?;
            docs.into_iter()
                .map(|doc| doc.into_entity().map_err(Into::into))
                .collect()
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
