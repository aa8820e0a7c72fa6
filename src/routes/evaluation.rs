use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use validator::Validate;

use crate::{
    dto::room::{EvaluationResultRequest, RoomStatusResponse},
    error::{AppError, ErrorBody},
    services::room_service,
    state::SharedState,
};

const EVALUATOR_TOKEN_HEADER: &str = "x-evaluator-token";

/// Push endpoint for evaluators running outside the service.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/evaluations/{room_key}/{index}", post(record_evaluation))
        .route_layer(middleware::from_fn_with_state(state, require_evaluator_token))
}

/// Record the score of argument `index`, or mark it as failed.
#[utoipa::path(
    post,
    path = "/evaluations/{room_key}/{index}",
    tag = "evaluations",
    params(
        ("X-Evaluator-Token" = String, Header, description = "Evaluator token from the service configuration"),
        ("room_key" = String, Path, description = "Shareable room key"),
        ("index" = usize, Path, description = "Position of the argument in the ledger")
    ),
    request_body = EvaluationResultRequest,
    responses(
        (status = 200, description = "Evaluation recorded", body = RoomStatusResponse),
        (status = 400, description = "Neither or both of score and failed", body = ErrorBody),
        (status = 401, description = "Missing or wrong evaluator token", body = ErrorBody),
        (status = 404, description = "Unknown room or argument", body = ErrorBody),
        (status = 409, description = "Argument already evaluated", body = ErrorBody)
    )
)]
pub async fn record_evaluation(
    State(state): State<SharedState>,
    Path((room_key, index)): Path<(String, usize)>,
    Json(payload): Json<EvaluationResultRequest>,
) -> Result<Json<RoomStatusResponse>, AppError> {
    payload.validate()?;
    let score = if payload.failed { None } else { payload.score };
    let status = room_service::record_evaluation(&state, &room_key, index, score).await?;
    Ok(Json(status))
}

async fn require_evaluator_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(EVALUATOR_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing evaluator token header `X-Evaluator-Token`".into())
        })?;

    if provided != state.evaluator_token() {
        return Err(AppError::Unauthorized("invalid evaluator token".into()));
    }
    Ok(next.run(req).await)
}
