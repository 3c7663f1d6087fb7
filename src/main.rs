//! Application entry point for the sensor ingest and reliable-delivery
//! pipeline backend.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool and a Redis connection
//! - Creating the database schema if it does not exist
//! - Spawning the delivery worker pool
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests until a shutdown
//!   signal arrives, at which point the worker pool is drained first
//!
//! # Environment Variables
//! See [`config::Config`] for the full list; `DATABASE_URL`, `CLIENT_HOST`,
//! `CLIENT_PORT`, and `SERVER_SECRET_KEY` are required, everything else has
//! a default.

use std::net::SocketAddr;
use std::sync::Arc;
use std::{env, io::IsTerminal};

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod auth;
mod config;
mod error;
mod ingest;
mod models;
mod queue;
mod routes;
mod schema;
mod store;
mod worker;

use config::Config;
use ingest::IngestService;
use queue::RedisWorkQueue;
use store::{PgCatalogStore, PgReadingStore};
use worker::{DeliveryWorker, WorkerConfig};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to connect to database: {}", cfg.db_url);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database '{}': {}", cfg.db_url, e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    tracing::info!("Attempting to connect to Redis: {}", cfg.redis_url);
    let queue = Arc::new(
        RedisWorkQueue::connect(&cfg.redis_url, &cfg.redis_queue_name, &cfg.redis_dlq_name)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to Redis '{}': {}", cfg.redis_url, e))?,
    );
    tracing::info!("Successfully connected to Redis");

    let reading_store = Arc::new(PgReadingStore::new(pool.clone()));
    let catalog_store = Arc::new(PgCatalogStore::new(pool.clone()));

    let ingest_service = IngestService::new(reading_store.clone(), catalog_store.clone(), queue.clone());

    let cancel = CancellationToken::new();
    let worker_config = WorkerConfig::from(&cfg);
    let mut worker_handles = Vec::with_capacity(cfg.worker_count as usize);
    for id in 0..cfg.worker_count {
        let worker = DeliveryWorker::new(
            reading_store.clone(),
            catalog_store.clone(),
            queue.clone(),
            worker_config.clone(),
            cancel.clone(),
        )?;
        tracing::info!(worker_id = id, "spawning delivery worker");
        worker_handles.push(tokio::spawn(worker.run()));
    }

    let cfg = Arc::new(cfg);
    let state = routes::AppState {
        ingest_service,
        config: cfg.clone(),
    };

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, draining delivery workers");
    cancel.cancel();
    for handle in worker_handles {
        let _ = handle.await;
    }

    Ok(())
}

/// Resolve once Ctrl-C or SIGTERM is received, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `AXUM_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
