use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the debate room backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::room::create_room,
        crate::routes::room::join_room,
        crate::routes::room::submit_argument,
        crate::routes::room::abort_debate,
        crate::routes::room::room_status,
        crate::routes::evaluation::record_evaluation,
        crate::routes::catalog::list_genres,
        crate::routes::catalog::list_topics,
        crate::routes::player::player_history,
        crate::routes::sse::room_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::SubmitArgumentRequest,
            crate::dto::room::EvaluationResultRequest,
            crate::dto::room::RoomResponse,
            crate::dto::room::RoomStatusResponse,
            crate::dto::catalog::GenreSummary,
            crate::dto::catalog::TopicSummary,
            crate::dto::player::PlayerStatsResponse,
            crate::error::ErrorBody,
            crate::state::room::RoomStatus,
            crate::state::room::Evaluation,
            crate::state::scoring::DebateResult,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Debate room lifecycle"),
        (name = "evaluations", description = "Argument scores pushed by the evaluator"),
        (name = "catalog", description = "Genres and topics"),
        (name = "players", description = "Player statistics"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
