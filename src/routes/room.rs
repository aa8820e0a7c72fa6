use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::room::{
        CreateRoomRequest, JoinRoomRequest, RoomResponse, RoomStatusResponse,
        SubmitArgumentRequest,
    },
    error::{AppError, ErrorBody},
    services::room_service,
    state::SharedState,
};

/// Routes driving a debate room from creation to its final status.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/create-room/{player}", post(create_room))
        .route("/join-room/{key}", post(join_room))
        .route("/submit-argument/{key}/{player}", post(submit_argument))
        .route("/abort-debate/{key}/{player}", post(abort_debate))
        .route("/room-status/{key}", get(room_status))
}

/// Open a room on a catalog topic with `player` in the first seat.
#[utoipa::path(
    post,
    path = "/create-room/{player}",
    tag = "rooms",
    params(("player" = String, Path, description = "Name of the creating player")),
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = RoomResponse),
        (status = 400, description = "Invalid player name or topic", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Path(player): Path<String>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    payload.validate()?;
    let room = room_service::create_room(&state, &player, &payload.topic_id).await?;
    Ok(Json(room))
}

/// Take the second seat of a waiting room and start the debate.
#[utoipa::path(
    post,
    path = "/join-room/{key}",
    tag = "rooms",
    params(("key" = String, Path, description = "Shareable room key")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Debate started", body = RoomResponse),
        (status = 404, description = "Unknown room", body = ErrorBody),
        (status = 409, description = "Room full or already running", body = ErrorBody)
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    Json(payload): Json<JoinRoomRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    payload.validate()?;
    let room = room_service::join_room(&state, &key, &payload.player_name).await?;
    Ok(Json(room))
}

/// Submit the argument of the player holding the turn.
#[utoipa::path(
    post,
    path = "/submit-argument/{key}/{player}",
    tag = "rooms",
    params(
        ("key" = String, Path, description = "Shareable room key"),
        ("player" = String, Path, description = "Submitting player")
    ),
    request_body = SubmitArgumentRequest,
    responses(
        (status = 200, description = "Argument recorded", body = RoomStatusResponse),
        (status = 400, description = "Empty or oversized argument", body = ErrorBody),
        (status = 404, description = "Unknown room or player", body = ErrorBody),
        (status = 409, description = "Not this player's turn or debate not running", body = ErrorBody)
    )
)]
pub async fn submit_argument(
    State(state): State<SharedState>,
    Path((key, player)): Path<(String, String)>,
    Json(payload): Json<SubmitArgumentRequest>,
) -> Result<Json<RoomStatusResponse>, AppError> {
    let status = room_service::submit_argument(&state, &key, &player, payload.argument).await?;
    Ok(Json(status))
}

/// Abort a running debate; the aborting player takes the penalty.
#[utoipa::path(
    post,
    path = "/abort-debate/{key}/{player}",
    tag = "rooms",
    params(
        ("key" = String, Path, description = "Shareable room key"),
        ("player" = String, Path, description = "Aborting player")
    ),
    responses(
        (status = 200, description = "Debate aborted", body = RoomStatusResponse),
        (status = 404, description = "Unknown room or player", body = ErrorBody),
        (status = 409, description = "Debate not running", body = ErrorBody)
    )
)]
pub async fn abort_debate(
    State(state): State<SharedState>,
    Path((key, player)): Path<(String, String)>,
) -> Result<Json<RoomStatusResponse>, AppError> {
    let status = room_service::abort_debate(&state, &key, &player).await?;
    Ok(Json(status))
}

/// Current snapshot of a room: ledger, totals and winner.
#[utoipa::path(
    get,
    path = "/room-status/{key}",
    tag = "rooms",
    params(("key" = String, Path, description = "Shareable room key")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomStatusResponse),
        (status = 404, description = "Unknown room", body = ErrorBody)
    )
)]
pub async fn room_status(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Json<RoomStatusResponse>, AppError> {
    let status = room_service::room_status(&state, &key).await?;
    Ok(Json(status))
}
