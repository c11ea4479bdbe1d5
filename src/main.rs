//! Pick'em backend binary entrypoint wiring HTTP, WebSocket, storage, and the
//! status-sync scheduler.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use dao::schedule::HttpScheduleSource;
use services::{game_status::GameStatusProvider, status_sync::StatusSyncScheduler};
use state::{AppState, EventBroadcaster, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let broadcaster = Arc::new(EventBroadcaster::new(config.broadcast_capacity));
    let app_state = AppState::new(config.clone(), broadcaster);

    spawn_storage(app_state.clone()).await;

    let schedule_source = Arc::new(HttpScheduleSource::new(
        config.upstream_base_url.clone(),
        config.fetch_timeout,
    )?);
    let provider = Arc::new(GameStatusProvider::new(schedule_source, config.snapshot_ttl));

    let scheduler = StatusSyncScheduler::new(app_state.clone(), provider);
    scheduler.start(None).await;

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

    scheduler.stop().await;
    Ok(())
}

/// Connect the MongoDB-backed store under supervision, reconnecting with
/// backoff and toggling degraded mode while it is away.
#[cfg(feature = "mongo-store")]
async fn spawn_storage(state: SharedState) {
    use dao::challenge_store::{ChallengeStore, mongodb::{MongoChallengeStore, MongoConfig}};
    use dao::storage::StorageError;

    let mongo_uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let mongo_db = env::var("MONGO_DB").ok();

    tokio::spawn(services::storage_supervisor::run(state, move || {
        let uri = mongo_uri.clone();
        let db = mongo_db.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoChallengeStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn ChallengeStore>)
        }
    }));
}

/// Install the in-memory store when built without a persistent backend.
#[cfg(not(feature = "mongo-store"))]
async fn spawn_storage(state: SharedState) {
    use dao::challenge_store::{ChallengeStore, memory::MemoryChallengeStore};

    let store = Arc::new(MemoryChallengeStore::new()) as Arc<dyn ChallengeStore>;
    state.install_challenge_store(store).await;
    info!("using in-memory challenge store");
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
