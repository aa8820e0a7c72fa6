use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{room::RoomStatusResponse, sse::ServerEvent},
    state::SharedState,
};

const EVENT_ROOM_UPDATED: &str = "room.updated";

/// Broadcast the committed snapshot of a room to its watchers.
pub fn broadcast_room_updated(state: &SharedState, status: &RoomStatusResponse) {
    send_room_event(state, &status.room.room_key, EVENT_ROOM_UPDATED, status);
}

fn send_room_event(state: &SharedState, room_key: &str, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.broadcast_room(room_key, event),
        Err(err) => warn!(event, room_key, error = %err, "failed to serialize room SSE payload"),
    }
}
