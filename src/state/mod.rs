pub mod catalog;
pub mod ledger;
pub mod players;
pub mod room;
pub mod scheduler;
pub mod scoring;
pub mod session;
mod sse;
pub mod state_machine;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::room_store::RoomStore,
    dto::sse::ServerEvent,
    error::ServiceError,
    services::evaluator::Evaluator,
    state::{catalog::Catalog, players::PlayerBoard, room::DebateRules},
};

pub use self::sse::{SseHub, SseState};
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId};
use self::{
    session::{DebateSession, RoomSnapshot},
    state_machine::{Applied, DebateEvent, DebateStateMachine},
};

pub type SharedState = Arc<AppState>;

const ROOM_EVENTS_CAPACITY: usize = 16;

/// Central application state: the room registry, player board and storage handle.
pub struct AppState {
    store: RwLock<Option<Arc<dyn RoomStore>>>,
    degraded: watch::Sender<bool>,
    rooms: DashMap<String, Arc<RoomSlot>>,
    players: PlayerBoard,
    catalog: Catalog,
    rules: DebateRules,
    evaluator: Option<Arc<dyn Evaluator>>,
    evaluator_attempts: u32,
    evaluator_token: String,
    result_deadline: Option<Duration>,
    sse: SseState,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, evaluator: Option<Arc<dyn Evaluator>>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            rooms: DashMap::new(),
            players: PlayerBoard::new(),
            catalog: config.catalog,
            rules: config.rules,
            evaluator,
            evaluator_attempts: config.evaluator.max_attempts.max(1),
            evaluator_token: config
                .evaluator
                .push_token
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
            result_deadline: config.evaluator.result_deadline,
            sse: SseState::new(ROOM_EVENTS_CAPACITY),
            transition_timeout: config.transition_timeout,
        })
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store, or [`ServiceError::Degraded`] while none is usable.
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        if *self.degraded.borrow() {
            return Err(ServiceError::Degraded);
        }
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Rules applied to every room.
    pub fn rules(&self) -> DebateRules {
        self.rules
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn players(&self) -> &PlayerBoard {
        &self.players
    }

    /// Pull-mode evaluator, when one is configured.
    pub fn evaluator(&self) -> Option<Arc<dyn Evaluator>> {
        self.evaluator.clone()
    }

    /// Attempts per argument before it is marked as failed.
    pub fn evaluator_attempts(&self) -> u32 {
        self.evaluator_attempts
    }

    /// Token pushed evaluation results must carry.
    pub fn evaluator_token(&self) -> &str {
        &self.evaluator_token
    }

    /// Wait before the scores still missing from a completed room are failed.
    pub fn result_deadline(&self) -> Option<Duration> {
        self.result_deadline
    }

    /// Upper bound on the work step of a transition.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout
    }

    /// Slot of a room already held in memory.
    pub fn room(&self, key: &str) -> Option<Arc<RoomSlot>> {
        self.rooms.get(key).map(|entry| entry.value().clone())
    }

    /// Number of rooms held in memory.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Whether `key` is already used by an in-memory room.
    pub fn contains_room(&self, key: &str) -> bool {
        self.rooms.contains_key(key)
    }

    /// Register a fresh room; returns `None` if the key is already taken.
    pub fn insert_room(&self, session: DebateSession) -> Option<Arc<RoomSlot>> {
        match self.rooms.entry(session.room.key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let slot = Arc::new(RoomSlot::new(session, self.rules));
                vacant.insert(slot.clone());
                Some(slot)
            }
        }
    }

    /// Register a room loaded from the store, keeping any slot inserted meanwhile.
    pub fn adopt_room(&self, session: DebateSession) -> Arc<RoomSlot> {
        self.rooms
            .entry(session.room.key.clone())
            .or_insert_with(|| Arc::new(RoomSlot::new(session, self.rules)))
            .value()
            .clone()
    }

    /// Drop `slot` from memory unless it was replaced meanwhile.
    pub fn evict_room(&self, key: &str, slot: &Arc<RoomSlot>) {
        self.rooms
            .remove_if(key, |_, resident| Arc::ptr_eq(resident, slot));
    }

    /// Subscribe to the change feed of a room.
    pub fn subscribe_room(&self, key: &str) -> broadcast::Receiver<ServerEvent> {
        self.sse.subscribe(key)
    }

    /// Push an event to the watchers of a room.
    pub fn broadcast_room(&self, key: &str, event: ServerEvent) {
        self.sse.broadcast(key, event);
    }

    /// Forget the feed of a room once nobody watches it.
    pub fn release_room_feed(&self, key: &str) {
        self.sse.release(key);
    }
}

/// A room held in memory: its state machine and the gate serializing its mutations.
pub struct RoomSlot {
    gate: Mutex<()>,
    machine: RwLock<DebateStateMachine>,
}

impl RoomSlot {
    pub fn new(session: DebateSession, rules: DebateRules) -> Self {
        Self {
            gate: Mutex::new(()),
            machine: RwLock::new(DebateStateMachine::new(session, rules)),
        }
    }

    /// Committed state of the room; never shows a planned transition.
    pub async fn snapshot(&self) -> RoomSnapshot {
        self.machine.read().await.snapshot()
    }

    /// Plan a transition to the room state machine, returning the plan.
    async fn plan_transition(&self, event: DebateEvent) -> Result<Plan, PlanError> {
        let mut sm = self.machine.write().await;
        sm.plan(event)
    }

    /// Apply the planned transition, returning the committed snapshot and its effects.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<Applied, ApplyError> {
        let mut sm = self.machine.write().await;
        sm.apply(plan_id)
    }

    /// Abort a planned transition of the room state machine.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.machine.write().await;
        sm.abort(plan_id)
    }

    /// Run `event` through plan, work and apply while holding the room gate.
    ///
    /// `work` receives the planned session (typically to persist it). When it
    /// fails or exceeds `limit` the plan is discarded and the committed state is
    /// left untouched.
    pub async fn run_transition<F, Fut>(
        &self,
        event: DebateEvent,
        limit: Option<Duration>,
        work: F,
    ) -> Result<Applied, ServiceError>
    where
        F: FnOnce(DebateSession) -> Fut,
        Fut: Future<Output = Result<(), ServiceError>>,
    {
        let gate = self.gate.lock().await;
        let Plan {
            id: plan_id, next, ..
        } = self.plan_transition(event.clone()).await?;

        let work_future = work(next);
        let outcome = if let Some(limit) = limit {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(()) => {
                let applied = self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok(applied)
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}
