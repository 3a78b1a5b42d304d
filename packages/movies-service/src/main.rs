//! `movies-service`: REST backend for a movie catalog.
//!
//! # Quick start
//!
//! ```sh
//! # In-memory store on the default port:
//! movies-service
//!
//! # Persistent SQLite store with provider access:
//! MOVIES_DB=./movies.db TMDB_KEY=... movies-service
//!
//! # Ingest trending movies hourly and send like notifications:
//! MOVIES_INGEST_INTERVAL_SECS=3600 NOTIFICATOR_URL=http://notificator:8000 movies-service
//! ```
//!
//! # Environment variables
//!
//! See [`movies_service::ServiceConfig`] for the full list.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use movies_service::{
    build_router,
    ingest::TrendingIngest,
    notify::HttpNotifier,
    storage::{memory::MemoryStorage, sqlite::SqliteStorage, Storage},
    AppState, ServiceConfig, TaskQueue, TmdbClient,
};

/// How long shutdown waits for queued background jobs.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ServiceConfig::from_env()?;

    let default_filter = if config.release {
        "movies_service=info,tower_http=info"
    } else {
        "movies_service=debug,tower_http=debug"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let storage: Arc<dyn Storage> = match &config.db_path {
        Some(path) => {
            tracing::info!("storage: SQLite at {path}");
            Arc::new(
                SqliteStorage::open(path)
                    .map_err(|e| format!("failed to open SQLite database at {path}: {e}"))?,
            )
        }
        None => {
            tracing::info!("storage: in-memory (data will not survive restart)");
            Arc::new(MemoryStorage::new())
        }
    };

    let metadata = Arc::new(TmdbClient::new(
        config.tmdb_url.clone(),
        config.tmdb_key.clone(),
        config.tmdb_timeout,
    )?);

    // Spawn the background trending ingestion loop.
    if config.ingest_interval_secs > 0 {
        let ingest = TrendingIngest::new(metadata.clone(), Arc::clone(&storage));
        let interval = Duration::from_secs(config.ingest_interval_secs);
        tracing::info!(
            "ingest: trending loop starting (interval = {}s)",
            config.ingest_interval_secs
        );
        tokio::spawn(ingest.run(interval));
    }

    let tasks = TaskQueue::new(config.task_workers, config.task_queue);
    let mut state = AppState::new(storage, metadata, tasks.clone());
    match &config.notificator_url {
        Some(url) => {
            tracing::info!("notifications: delivering to {url}");
            let client = reqwest::Client::builder().timeout(config.tmdb_timeout).build()?;
            state = state.with_notifier(Arc::new(HttpNotifier::new(client, url.clone())));
        }
        None => tracing::info!("notifications: disabled"),
    }

    let app = build_router(state);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("draining background jobs");
    if tokio::time::timeout(DRAIN_TIMEOUT, tasks.wait_idle()).await.is_err() {
        tracing::warn!("background jobs still running after {}s; exiting", DRAIN_TIMEOUT.as_secs());
    }
    let stats = tasks.stats();
    tracing::info!(
        submitted = stats.submitted,
        succeeded = stats.succeeded,
        failed = stats.failed,
        rejected = stats.rejected,
        "shutdown complete"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
