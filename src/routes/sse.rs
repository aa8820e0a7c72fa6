use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::sse::ServerEvent,
    error::{AppError, ErrorBody},
    services::sse_service,
    state::SharedState,
};

const EVENT_ROOM_SNAPSHOT: &str = "room.snapshot";

#[utoipa::path(
    get,
    path = "/sse/rooms/{key}",
    tag = "sse",
    params(("key" = String, Path, description = "Shareable room key")),
    responses(
        (status = 200, description = "Room change stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown room", body = ErrorBody)
    )
)]
/// Stream the snapshot of a room, then every committed change.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (status, receiver) = sse_service::subscribe_room(&state, &key).await?;
    let initial = ServerEvent::json(Some(EVENT_ROOM_SNAPSHOT.to_string()), &status)
        .map_err(|err| AppError::ServiceUnavailable(err.to_string()))?;
    info!(room_key = %key, "new room SSE connection");
    Ok(sse_service::to_sse_stream(state, key, initial, receiver))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/rooms/{key}", get(room_stream))
}
