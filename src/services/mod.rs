/// Genre and topic browsing.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// External argument scoring, pull mode and retries.
pub mod evaluator;
/// Health check service.
pub mod health_service;
/// Player statistics lookups.
pub mod player_service;
/// Room registry: create, join, submit, abort and status.
pub mod room_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming of room changes.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
