use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    services::player_service,
    state::SharedState,
};

pub(crate) const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RoomStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                player_service::hydrate(&state, store.as_ref()).await;
                state.set_room_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded().await {
                                info!("storage healthy again; leaving degraded mode");
                                state.update_degraded(false).await;
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "storage health check failed");
                            if reconnect(&state, store.as_ref()).await {
                                state.update_degraded(false).await;
                                sleep(HEALTH_POLL_INTERVAL).await;
                            } else {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                break;
                            }
                        }
                    }
                }

                sleep(delay).await;
                delay = next_delay(delay);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = next_delay(delay);
            }
        }
    }
}

/// Exponential backoff step shared by every storage retry loop.
pub(crate) fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

/// Retry the backend a few times, entering degraded mode after the first failure.
async fn reconnect(state: &SharedState, store: &dyn RoomStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(reconnect_err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %reconnect_err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = next_delay(reconnect_delay);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::future::{BoxFuture, ready};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{PlayerEntity, RoomEntity},
            room_store::memory::MemoryRoomStore,
            storage::StorageResult,
        },
        state::AppState,
    };

    /// Memory store whose health can be switched off.
    struct Flickering {
        inner: MemoryRoomStore,
        healthy: Arc<AtomicBool>,
    }

    impl Flickering {
        fn status(&self) -> BoxFuture<'static, StorageResult<()>> {
            let result = if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(StorageError::unavailable(
                    "offline".into(),
                    std::io::Error::other("offline"),
                ))
            };
            Box::pin(ready(result))
        }
    }

    impl RoomStore for Flickering {
        fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_room(room)
        }
        fn find_room(&self, key: String) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.find_room(key)
        }
        fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
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
            self.status()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.status()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn toggles_degraded_mode_with_backend_health() {
        let state = AppState::new(AppConfig::default(), None);
        let healthy = Arc::new(AtomicBool::new(true));
        let store: Arc<dyn RoomStore> = Arc::new(Flickering {
            inner: MemoryRoomStore::new(),
            healthy: healthy.clone(),
        });

        assert!(state.is_degraded().await);
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok(store) }
        }));

        sleep(Duration::from_millis(10)).await;
        assert!(!state.is_degraded().await);

        healthy.store(false, Ordering::SeqCst);
        sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(10)).await;
        assert!(state.is_degraded().await);

        healthy.store(true, Ordering::SeqCst);
        sleep(MAX_DELAY * 2).await;
        assert!(!state.is_degraded().await);

        supervisor.abort();
    }
}
