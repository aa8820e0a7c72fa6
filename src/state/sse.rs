use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState): one hub per watched room.
pub struct SseState {
    rooms: DashMap<String, SseHub>,
    capacity: usize,
}

impl SseState {
    /// Build the SSE sub-tree with the given per-room channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to the events of `room_key`, creating its hub on first use.
    pub fn subscribe(&self, room_key: &str) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(room_key.to_string())
            .or_insert_with(|| SseHub::new(self.capacity))
            .subscribe()
    }

    /// Send an event to the watchers of `room_key`; nothing happens when nobody watches.
    pub fn broadcast(&self, room_key: &str, event: ServerEvent) {
        if let Some(hub) = self.rooms.get(room_key) {
            hub.broadcast(event);
        }
    }

    /// Drop the hub of `room_key` once its last subscriber is gone.
    pub fn release(&self, room_key: &str) {
        self.rooms
            .remove_if(room_key, |_, hub| hub.receiver_count() == 0);
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_only_reach_watchers_of_the_same_room() {
        let sse = SseState::new(4);
        let mut first = sse.subscribe("ROOM0001");
        let mut other = sse.subscribe("ROOM0002");

        sse.broadcast("ROOM0001", ServerEvent::new("room.updated", "{}".into()));

        assert_eq!(first.try_recv().unwrap().data, "{}");
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn hub_is_released_after_last_subscriber() {
        let sse = SseState::new(4);
        let receiver = sse.subscribe("ROOM0001");

        sse.release("ROOM0001");
        assert!(sse.rooms.contains_key("ROOM0001"));

        drop(receiver);
        sse.release("ROOM0001");
        assert!(!sse.rooms.contains_key("ROOM0001"));
    }
}
