use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::catalog::{GenreSummary, TopicSummary},
    error::{AppError, ErrorBody},
    services::catalog_service,
    state::SharedState,
};

/// Read-only catalog browsing.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/genres", get(list_genres))
        .route("/topics/{genre}", get(list_topics))
}

#[utoipa::path(
    get,
    path = "/genres",
    tag = "catalog",
    responses((status = 200, description = "Available genres", body = [GenreSummary]))
)]
/// List every genre a room topic can be picked from.
pub async fn list_genres(State(state): State<SharedState>) -> Json<Vec<GenreSummary>> {
    Json(catalog_service::list_genres(&state))
}

#[utoipa::path(
    get,
    path = "/topics/{genre}",
    tag = "catalog",
    params(("genre" = String, Path, description = "Genre identifier")),
    responses(
        (status = 200, description = "Topics of the genre", body = [TopicSummary]),
        (status = 404, description = "Unknown genre", body = ErrorBody)
    )
)]
/// List the debate topics of a genre.
pub async fn list_topics(
    State(state): State<SharedState>,
    Path(genre): Path<String>,
) -> Result<Json<Vec<TopicSummary>>, AppError> {
    let topics = catalog_service::list_topics(&state, &genre)?;
    Ok(Json(topics))
}
