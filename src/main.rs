//! Debate Room Back binary entrypoint wiring REST, SSE, storage and evaluator layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use debate_room_back::{
    config::AppConfig,
    dao::room_store::{RoomStore, memory::MemoryRoomStore},
    routes,
    services::{
        evaluator::{Evaluator, HttpEvaluator},
        storage_supervisor,
    },
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let evaluator = build_evaluator(&config)?;
    let generated_token = config.evaluator.push_token.is_none();
    let app_state = AppState::new(config, evaluator);
    if generated_token {
        info!(token = %app_state.evaluator_token(), "generated evaluator push token");
    }

    start_storage(app_state.clone()).await?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pull-mode evaluator when a URL is configured; otherwise scores are pushed.
fn build_evaluator(config: &AppConfig) -> anyhow::Result<Option<Arc<dyn Evaluator>>> {
    let Some(url) = config.evaluator.url.clone() else {
        info!("no evaluator URL configured; waiting for pushed evaluations");
        return Ok(None);
    };
    let evaluator =
        HttpEvaluator::new(url.clone(), config.evaluator.timeout).context("building evaluator")?;
    info!(%url, "using HTTP evaluator");
    Ok(Some(Arc::new(evaluator)))
}

/// Install the storage backend selected by `STORE_BACKEND` (memory, couch or mongo).
///
/// Remote backends are connected by the supervisor in the background; the
/// service stays in degraded mode until the first connection succeeds.
async fn start_storage(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into());
    match backend.as_str() {
        "memory" => {
            let store: Arc<dyn RoomStore> = Arc::new(MemoryRoomStore::new());
            state.set_room_store(store).await;
            info!("using in-memory storage");
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            use debate_room_back::dao::{
                room_store::couchdb::{CouchConfig, CouchRoomStore},
                storage::StorageError,
            };

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = CouchConfig::from_env()?;
                let store = CouchRoomStore::connect(config).await?;
                Ok::<Arc<dyn RoomStore>, StorageError>(Arc::new(store))
            }));
            info!("using CouchDB storage");
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            use debate_room_back::dao::{
                room_store::mongodb::{MongoConfig, MongoRoomStore},
                storage::StorageError,
            };

            tokio::spawn(storage_supervisor::run(state, || async {
                let config = MongoConfig::from_env().await?;
                let store = MongoRoomStore::connect(config).await?;
                Ok::<Arc<dyn RoomStore>, StorageError>(Arc::new(store))
            }));
            info!("using MongoDB storage");
        }
        other => anyhow::bail!("unsupported STORE_BACKEND `{other}`"),
    }
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
