use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payload of `/healthcheck`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "ok", or "degraded" while storage is unreachable.
    pub status: String,
    /// Rooms currently held in memory.
    pub active_rooms: usize,
}

impl HealthResponse {
    pub fn ok(active_rooms: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_rooms,
        }
    }

    pub fn degraded(active_rooms: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_rooms,
        }
    }
}
