use axum::Router;

use crate::state::SharedState;

pub mod catalog;
pub mod docs;
pub mod evaluation;
pub mod health;
pub mod player;
pub mod room;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(room::router())
        .merge(evaluation::router(state.clone()))
        .merge(catalog::router())
        .merge(player::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
