use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::player::PlayerStatsResponse,
    error::{AppError, ErrorBody},
    services::player_service,
    state::SharedState,
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/player/history/{username}", get(player_history))
}

#[utoipa::path(
    get,
    path = "/player/history/{username}",
    tag = "players",
    params(("username" = String, Path, description = "Player name")),
    responses(
        (status = 200, description = "Statistics and debate history", body = PlayerStatsResponse),
        (status = 404, description = "Player never finished a debate", body = ErrorBody)
    )
)]
/// Cumulative statistics, ranking and history of a player.
pub async fn player_history(
    State(state): State<SharedState>,
    Path(username): Path<String>,
) -> Result<Json<PlayerStatsResponse>, AppError> {
    let stats = player_service::player_history(&state, &username).await?;
    Ok(Json(stats))
}
