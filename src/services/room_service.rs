//! Session registry operations: create, join, submit, abort, read and evaluation
//! recording. Every mutation runs through the room's state machine, persists the
//! planned state inside the room gate and only then commits it.

use std::{sync::Arc, time::SystemTime};

use rand::{Rng, rng};
use tracing::{debug, info};

use crate::{
    dao::room_store::RoomStore,
    dto::{
        room::{RoomResponse, RoomStatusResponse},
        validation::validate_player_name,
    },
    error::ServiceError,
    services::{evaluator, player_service, sse_events},
    state::{
        RoomSlot, SharedState,
        room::Room,
        session::DebateSession,
        state_machine::{Applied, DebateEvent, Effects},
    },
};

/// Characters used in room keys; look-alikes (0/O, 1/I/L) are left out.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const KEY_LENGTH: usize = 8;
const MAX_KEY_ATTEMPTS: usize = 16;

/// Open a new room seated by `creator` on the catalog topic `topic_id`.
pub async fn create_room(
    state: &SharedState,
    creator: &str,
    topic_id: &str,
) -> Result<RoomResponse, ServiceError> {
    let creator = sanitize_player_name(creator)?;
    let topic = state
        .catalog()
        .topic(topic_id)
        .cloned()
        .ok_or_else(|| ServiceError::InvalidInput(format!("unknown topic `{topic_id}`")))?;
    let store = state.require_room_store().await?;

    let key = generate_unique_key(state, store.as_ref()).await?;
    let session = DebateSession::new(Room::open(key.clone(), topic, creator.clone()));

    persist(state, store.as_ref(), session.clone()).await?;
    let slot = state
        .insert_room(session)
        .ok_or_else(|| ServiceError::Conflict(format!("room key `{key}` already in use")))?;

    info!(room_key = %key, creator = %creator, "room created");
    Ok(slot.snapshot().await.room.into())
}

/// Seat `joiner` as the second player of room `key`.
pub async fn join_room(
    state: &SharedState,
    key: &str,
    joiner: &str,
) -> Result<RoomResponse, ServiceError> {
    let joiner = sanitize_player_name(joiner)?;
    let snapshot = mutate(state, key, DebateEvent::Join { player: joiner }).await?;
    Ok(snapshot.room)
}

/// Append an argument for the player holding the turn.
pub async fn submit_argument(
    state: &SharedState,
    key: &str,
    player: &str,
    content: String,
) -> Result<RoomStatusResponse, ServiceError> {
    mutate(
        state,
        key,
        DebateEvent::Submit {
            player: player.to_string(),
            content,
        },
    )
    .await
}

/// End a running debate early, charging the penalty to `player`.
pub async fn abort_debate(
    state: &SharedState,
    key: &str,
    player: &str,
) -> Result<RoomStatusResponse, ServiceError> {
    mutate(
        state,
        key,
        DebateEvent::Abort {
            player: player.to_string(),
        },
    )
    .await
}

/// Record the evaluator's answer for argument `index`; `None` marks it as failed.
pub async fn record_evaluation(
    state: &SharedState,
    key: &str,
    index: usize,
    score: Option<f64>,
) -> Result<RoomStatusResponse, ServiceError> {
    mutate(state, key, DebateEvent::Evaluated { index, score }).await
}

/// Consistent snapshot of room `key` with totals and winner.
pub async fn room_status(state: &SharedState, key: &str) -> Result<RoomStatusResponse, ServiceError> {
    let slot = load_room(state, key).await?;
    Ok(slot.snapshot().await.into())
}

/// Room slot from memory, rehydrated from the store on first access.
///
/// Settled rooms are served from a detached slot: they accept no further
/// change, so they are not kept resident.
async fn load_room(state: &SharedState, key: &str) -> Result<Arc<RoomSlot>, ServiceError> {
    if let Some(slot) = state.room(key) {
        return Ok(slot);
    }

    let store = state.require_room_store().await?;
    let entity = store
        .find_room(key.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{key}` not found")))?;

    debug!(room_key = %key, "room rehydrated from storage");
    if entity.settled {
        return Ok(Arc::new(RoomSlot::new(entity.into(), state.rules())));
    }
    Ok(state.adopt_room(entity.into()))
}

async fn mutate(
    state: &SharedState,
    key: &str,
    event: DebateEvent,
) -> Result<RoomStatusResponse, ServiceError> {
    let slot = load_room(state, key).await?;
    let store = state.require_room_store().await?;

    let Applied { snapshot, effects } = slot
        .run_transition(event, state.transition_timeout(), move |next| async move {
            store.save_room(next.into()).await?;
            Ok(())
        })
        .await?;

    let response = RoomStatusResponse::from(snapshot);
    sse_events::broadcast_room_updated(state, &response);
    handle_effects(state, key, effects);

    if response.settled {
        state.evict_room(key, &slot);
        debug!(room_key = %key, "settled room evicted from memory");
    }
    Ok(response)
}

/// Run the follow-up work of a committed transition.
fn handle_effects(state: &SharedState, key: &str, effects: Effects) {
    if let Some(request) = effects.evaluation {
        evaluator::dispatch(state, request);
    }
    if !effects.awaiting_evaluations.is_empty() {
        evaluator::expire_after_deadline(state, key.to_string(), effects.awaiting_evaluations);
    }

    let Some(settlement) = effects.settlement else {
        return;
    };

    info!(
        room_key = %settlement.room_key,
        winner = ?settlement.winner,
        "debate settled"
    );
    let updated = state
        .players()
        .apply_settlement(&settlement, SystemTime::now());
    player_service::persist_players(
        state,
        updated.into_iter().map(|stats| stats.username).collect(),
    );
}

async fn persist(
    state: &SharedState,
    store: &dyn RoomStore,
    session: DebateSession,
) -> Result<(), ServiceError> {
    let save = store.save_room(session.into());
    match state.transition_timeout() {
        Some(limit) => tokio::time::timeout(limit, save)
            .await
            .map_err(|_| ServiceError::Timeout)??,
        None => save.await?,
    }
    Ok(())
}

async fn generate_unique_key(
    state: &SharedState,
    store: &dyn RoomStore,
) -> Result<String, ServiceError> {
    for _ in 0..MAX_KEY_ATTEMPTS {
        let key = random_key();
        if state.contains_room(&key) {
            continue;
        }
        if store.find_room(key.clone()).await?.is_none() {
            return Ok(key);
        }
    }
    Err(ServiceError::Conflict(
        "could not allocate a unique room key".into(),
    ))
}

fn random_key() -> String {
    let mut rng = rng();
    (0..KEY_LENGTH)
        .map(|_| char::from(KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())]))
        .collect()
}

fn sanitize_player_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim();
    validate_player_name(trimmed).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| "invalid player name".into()),
        )
    })?;
    Ok(trimmed.to_string())
}
