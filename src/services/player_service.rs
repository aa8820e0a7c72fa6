use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{models::PlayerEntity, room_store::RoomStore},
    dto::player::PlayerStatsResponse,
    error::ServiceError,
    services::storage_supervisor::{INITIAL_DELAY, next_delay},
    state::SharedState,
};

const MAX_SAVE_ATTEMPTS: u32 = 5;

/// Statistics and history of `username`, ranking included.
pub async fn player_history(
    state: &SharedState,
    username: &str,
) -> Result<PlayerStatsResponse, ServiceError> {
    if state.players().get(username).is_none() {
        if let Some(store) = state.room_store().await {
            if let Some(entity) = store.find_player(username.to_string()).await? {
                state.players().hydrate([entity]);
            }
        }
    }

    let stats = state
        .players()
        .get(username)
        .ok_or_else(|| ServiceError::NotFound(format!("player `{username}` not found")))?;
    let ranking = state.players().ranking_of(username).unwrap_or(1);
    Ok((stats, ranking).into())
}

/// Persist the statistics of `usernames` in the background, retrying failed
/// writes with the storage backoff.
pub fn persist_players(state: &SharedState, usernames: Vec<String>) {
    let state = state.clone();
    tokio::spawn(async move {
        for username in usernames {
            save_with_retry(&state, &username).await;
        }
    });
}

async fn save_with_retry(state: &SharedState, username: &str) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 1..=MAX_SAVE_ATTEMPTS {
        // Re-read every attempt so a retry carries later settlements too.
        let Some(stats) = state.players().get(username) else {
            return false;
        };
        let outcome = match state.room_store().await {
            Some(store) => store
                .save_player(PlayerEntity::from(stats))
                .await
                .map_err(|err| err.to_string()),
            None => Err("no storage installed".to_string()),
        };
        match outcome {
            Ok(()) => return true,
            Err(error) => {
                warn!(player = %username, attempt, error = %error, "failed to persist player statistics");
                if attempt < MAX_SAVE_ATTEMPTS {
                    sleep(delay).await;
                    delay = next_delay(delay);
                }
            }
        }
    }

    warn!(player = %username, "giving up on persisting player statistics");
    false
}

/// Load every persisted player so rankings cover the whole board.
pub async fn hydrate(state: &SharedState, store: &dyn RoomStore) {
    match store.list_players().await {
        Ok(players) => {
            let count = players.len();
            state.players().hydrate(players);
            info!(count, "player statistics loaded from storage");
        }
        Err(err) => warn!(error = %err, "failed to load player statistics"),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use futures::future::{BoxFuture, ready};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::RoomEntity,
            room_store::memory::MemoryRoomStore,
            storage::{StorageError, StorageResult},
        },
        state::{AppState, scoring::DebateResult},
    };

    fn entity(username: &str, total_score: f64) -> PlayerEntity {
        PlayerEntity {
            username: username.into(),
            wins: 1,
            losses: 0,
            draws: 0,
            total_score,
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let state = AppState::new(AppConfig::default(), None);
        assert!(matches!(
            player_history(&state, "ghost").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn hydrated_players_are_ranked() {
        let store = MemoryRoomStore::new();
        store.save_player(entity("alice", 10.0)).await.unwrap();
        store.save_player(entity("bob", 25.0)).await.unwrap();

        let state = AppState::new(AppConfig::default(), None);
        hydrate(&state, &store).await;
        state.set_room_store(Arc::new(store)).await;

        let alice = player_history(&state, "alice").await.unwrap();
        assert_eq!(alice.player.ranking, 2);
        assert_eq!(player_history(&state, "bob").await.unwrap().player.ranking, 1);
    }

    #[tokio::test]
    async fn history_is_listed_newest_first() {
        let store = MemoryRoomStore::new();
        let mut record = entity("alice", 3.0);
        for (key, result) in [("OLD00001", DebateResult::Loss), ("NEW00001", DebateResult::Win)] {
            record.history.push(crate::dao::models::HistoryEntryEntity {
                room_key: key.into(),
                topic: "Remote work".into(),
                opponent: "bob".into(),
                result,
                score: 1.5,
                settled_at: std::time::SystemTime::UNIX_EPOCH,
            });
        }
        store.save_player(record).await.unwrap();

        let state = AppState::new(AppConfig::default(), None);
        state.set_room_store(Arc::new(store)).await;

        let response = player_history(&state, "alice").await.unwrap();
        assert_eq!(response.history[0].id, "NEW00001");
        assert_eq!(response.history[0].result, DebateResult::Win);
        assert_eq!(response.history[1].date, "1970-01-01T00:00:00Z");
    }

    /// Store whose first `failures` player writes fail.
    struct FlakyPlayers {
        inner: MemoryRoomStore,
        failures: usize,
        attempts: AtomicUsize,
    }

    impl RoomStore for FlakyPlayers {
        fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_room(room)
        }
        fn find_room(&self, key: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.find_room(key)
        }
        fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Box::pin(ready(Err(StorageError::unavailable(
                    "connection reset".into(),
                    std::io::Error::other("connection reset"),
                ))));
            }
            self.inner.save_player(player)
        }
        fn find_player(
            &self,
            username: String,
        ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
            self.inner.find_player(username)
        }
        fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
            self.inner.list_players()
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_player_writes_are_retried() {
        let memory = MemoryRoomStore::new();
        let store = Arc::new(FlakyPlayers {
            inner: memory.clone(),
            failures: 2,
            attempts: AtomicUsize::new(0),
        });
        let state = AppState::new(AppConfig::default(), None);
        state.set_room_store(store.clone()).await;
        state.players().hydrate([entity("alice", 12.5)]);

        persist_players(&state, vec!["alice".into()]);
        sleep(Duration::from_secs(30)).await;

        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        let saved = memory.find_player("alice".into()).await.unwrap().unwrap();
        assert_eq!(saved.total_score, 12.5);
    }
}
