use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    client::api::{ClientError, RoomApi},
    dto::room::RoomStatusResponse,
};

const EVENTS_CAPACITY: usize = 16;

/// What the poller reports to its owner.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Fresh snapshot of a running room.
    Snapshot(RoomStatusResponse),
    /// First final snapshot (terminal and settled); emitted once, after which
    /// polling stops. A terminal room still waiting on scores is a `Snapshot`.
    Finished(RoomStatusResponse),
    /// A scheduled fetch failed; polling continues.
    FetchFailed(String),
}

struct Shared {
    api: Arc<dyn RoomApi>,
    room_key: String,
    /// Held for the duration of every call, so at most one is outstanding.
    calls: Mutex<()>,
    finished: AtomicBool,
    events: mpsc::Sender<SyncEvent>,
}

impl Shared {
    async fn fetch(&self) {
        match self.api.fetch_status(self.room_key.clone()).await {
            Ok(status) => self.publish(status).await,
            Err(err) => {
                warn!(room_key = %self.room_key, error = %err, "room status fetch failed");
                let _ = self.events.send(SyncEvent::FetchFailed(err.to_string())).await;
            }
        }
    }

    async fn publish(&self, status: RoomStatusResponse) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        let event = if status.is_final() {
            if self.finished.swap(true, Ordering::SeqCst) {
                return;
            }
            info!(room_key = %self.room_key, status = ?status.room.status, "room finished");
            SyncEvent::Finished(status)
        } else {
            SyncEvent::Snapshot(status)
        };
        let _ = self.events.send(event).await;
    }
}

/// Periodically pulls the status of one room until it reaches a final state.
///
/// Dropping the poller cancels its schedule.
pub struct RoomPoller {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RoomPoller {
    /// Start polling `room_key` every `period`; the first fetch happens immediately.
    pub fn spawn(
        api: Arc<dyn RoomApi>,
        room_key: impl Into<String>,
        period: Duration,
    ) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENTS_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            api,
            room_key: room_key.into(),
            calls: Mutex::new(()),
            finished: AtomicBool::new(false),
            events: events_tx,
        });

        let task = tokio::spawn(run(shared.clone(), period, shutdown_rx));
        (
            Self {
                shared,
                shutdown: shutdown_tx,
                task,
            },
            events_rx,
        )
    }

    /// Whether a terminal snapshot has been observed.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    /// Submit an argument, then refresh the room right away.
    pub async fn submit(
        &self,
        player: &str,
        argument: &str,
    ) -> Result<RoomStatusResponse, ClientError> {
        let _call = self.shared.calls.lock().await;
        let status = self
            .shared
            .api
            .submit(
                self.shared.room_key.clone(),
                player.to_string(),
                argument.to_string(),
            )
            .await?;
        self.shared.fetch().await;
        Ok(status)
    }

    /// Abort the debate, then refresh the room right away.
    pub async fn abort(&self, player: &str) -> Result<RoomStatusResponse, ClientError> {
        let _call = self.shared.calls.lock().await;
        let status = self
            .shared
            .api
            .abort(self.shared.room_key.clone(), player.to_string())
            .await?;
        self.shared.fetch().await;
        Ok(status)
    }

    /// Stop the schedule; calls already running finish on their own.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

impl Drop for RoomPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(shared: Arc<Shared>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if shared.finished.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(_call) = shared.calls.try_lock() else {
                    debug!(room_key = %shared.room_key, "call in flight; skipping tick");
                    continue;
                };
                shared.fetch().await;
                if shared.finished.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    debug!(room_key = %shared.room_key, "room poller stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex as StdMutex,
        atomic::{AtomicUsize, Ordering},
    };

    use futures::future::BoxFuture;
    use tokio::time::sleep;

    use super::*;
    use crate::{
        dto::{
            catalog::TopicSummary,
            room::{RoomResponse, ScoresSummary},
        },
        state::room::RoomStatus,
    };

    fn status(room_status: RoomStatus, settled: bool) -> RoomStatusResponse {
        let topic = TopicSummary {
            id: "sci-space".into(),
            title: "Space exploration".into(),
            description: String::new(),
        };
        RoomStatusResponse {
            room: RoomResponse {
                room_key: "POLL2345".into(),
                topic: topic.clone(),
                player1: "alice".into(),
                player2: Some("bob".into()),
                current_round: 1,
                current_turn: Some("alice".into()),
                status: room_status,
                created_at: "2026-01-01T00:00:00Z".into(),
                updated_at: "2026-01-01T00:00:00Z".into(),
            },
            topic,
            arguments: Vec::new(),
            rounds: Vec::new(),
            scores: ScoresSummary {
                player1: 0.0,
                player2: 0.0,
            },
            winner: None,
            penalty: None,
            pending_evaluations: if room_status.is_terminal() && !settled { 1 } else { 0 },
            settled,
            version: 1,
        }
    }

    struct Server {
        status: StdMutex<(RoomStatus, bool)>,
        latency: Duration,
        fetches: AtomicUsize,
        submits: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl Server {
        fn new(latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                status: StdMutex::new((RoomStatus::InProgress, false)),
                latency,
                fetches: AtomicUsize::new(0),
                submits: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            })
        }

        fn set(&self, room_status: RoomStatus) {
            *self.status.lock().unwrap() = (room_status, room_status.is_terminal());
        }

        /// Terminal status with evaluations still outstanding.
        fn set_unsettled(&self, room_status: RoomStatus) {
            *self.status.lock().unwrap() = (room_status, false);
        }

        fn call(
            self: Arc<Self>,
        ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>> {
            Box::pin(async move {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now, Ordering::SeqCst);
                sleep(self.latency).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                let (current, settled) = *self.status.lock().unwrap();
                Ok(status(current, settled))
            })
        }
    }

    struct FakeApi(Arc<Server>);

    impl RoomApi for FakeApi {
        fn fetch_status(
            &self,
            _room_key: String,
        ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>> {
            self.0.fetches.fetch_add(1, Ordering::SeqCst);
            self.0.clone().call()
        }

        fn submit(
            &self,
            _room_key: String,
            _player: String,
            _argument: String,
        ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>> {
            self.0.submits.fetch_add(1, Ordering::SeqCst);
            self.0.clone().call()
        }

        fn abort(
            &self,
            _room_key: String,
            _player: String,
        ) -> BoxFuture<'static, Result<RoomStatusResponse, ClientError>> {
            self.0.submits.fetch_add(1, Ordering::SeqCst);
            self.0.clone().call()
        }
    }

    fn spawn(server: &Arc<Server>, period: Duration) -> (RoomPoller, mpsc::Receiver<SyncEvent>) {
        RoomPoller::spawn(Arc::new(FakeApi(server.clone())), "POLL2345", period)
    }

    #[tokio::test(start_paused = true)]
    async fn finished_is_emitted_once_and_polling_stops() {
        let server = Server::new(Duration::from_millis(10));
        let (poller, mut events) = spawn(&server, Duration::from_secs(1));

        assert!(matches!(events.recv().await, Some(SyncEvent::Snapshot(_))));
        server.set(RoomStatus::Completed);

        let finished = loop {
            match events.recv().await {
                Some(SyncEvent::Finished(status)) => break status,
                Some(_) => continue,
                None => panic!("poller closed its channel"),
            }
        };
        assert_eq!(finished.room.status, RoomStatus::Completed);
        assert!(poller.is_finished());

        let fetches = server.fetches.load(Ordering::SeqCst);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(server.fetches.load(Ordering::SeqCst), fetches);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn completed_room_keeps_polling_until_settled() {
        let server = Server::new(Duration::from_millis(10));
        let (poller, mut events) = spawn(&server, Duration::from_secs(1));
        assert!(matches!(events.recv().await, Some(SyncEvent::Snapshot(_))));

        server.set_unsettled(RoomStatus::Completed);
        let pending = loop {
            match events.recv().await {
                Some(SyncEvent::Snapshot(status)) if status.is_terminal() => break status,
                Some(SyncEvent::Finished(_)) => panic!("finished before settlement"),
                Some(_) => continue,
                None => panic!("poller closed its channel"),
            }
        };
        assert_eq!(pending.pending_evaluations, 1);
        assert!(!poller.is_finished());

        server.set(RoomStatus::Completed);
        let finished = loop {
            match events.recv().await {
                Some(SyncEvent::Finished(status)) => break status,
                Some(_) => continue,
                None => panic!("poller closed its channel"),
            }
        };
        assert!(finished.settled);
        assert!(poller.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn never_runs_two_calls_at_once() {
        let server = Server::new(Duration::from_millis(2_500));
        let (poller, _events) = spawn(&server, Duration::from_secs(1));

        sleep(Duration::from_millis(500)).await;
        poller.submit("alice", "Rockets are cheap now").await.unwrap();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(server.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(server.submits.load(Ordering::SeqCst), 1);
        assert!(server.fetches.load(Ordering::SeqCst) < 10);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_triggers_an_immediate_fetch() {
        let server = Server::new(Duration::from_millis(1));
        let (poller, mut events) = spawn(&server, Duration::from_secs(60));

        assert!(matches!(events.recv().await, Some(SyncEvent::Snapshot(_))));
        assert_eq!(server.fetches.load(Ordering::SeqCst), 1);

        poller.submit("alice", "Opening").await.unwrap();
        assert_eq!(server.fetches.load(Ordering::SeqCst), 2);
        assert!(matches!(events.recv().await, Some(SyncEvent::Snapshot(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_reports_the_final_state_once() {
        let server = Server::new(Duration::from_millis(1));
        let (poller, mut events) = spawn(&server, Duration::from_secs(60));
        assert!(matches!(events.recv().await, Some(SyncEvent::Snapshot(_))));

        server.set(RoomStatus::Aborted);
        let returned = poller.abort("bob").await.unwrap();
        assert_eq!(returned.room.status, RoomStatus::Aborted);
        assert!(matches!(events.recv().await, Some(SyncEvent::Finished(_))));

        sleep(Duration::from_secs(120)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_cancels_the_schedule() {
        let server = Server::new(Duration::from_millis(1));
        let (poller, mut events) = spawn(&server, Duration::from_secs(1));
        assert!(matches!(events.recv().await, Some(SyncEvent::Snapshot(_))));

        drop(poller);
        let fetches = server.fetches.load(Ordering::SeqCst);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(server.fetches.load(Ordering::SeqCst), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_polling() {
        let server = Server::new(Duration::from_millis(1));
        let (poller, mut events) = spawn(&server, Duration::from_secs(1));
        assert!(matches!(events.recv().await, Some(SyncEvent::Snapshot(_))));

        poller.shutdown();
        sleep(Duration::from_millis(10)).await;
        let fetches = server.fetches.load(Ordering::SeqCst);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(server.fetches.load(Ordering::SeqCst), fetches);
    }
}
