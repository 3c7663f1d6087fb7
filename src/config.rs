//! Configuration loader for the sensor ingest/delivery backend.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string (reading + catalog stores).
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Redis connection string (work queue).
    pub redis_url: String,

    /// Ingest HTTP listen port.
    pub port: u16,

    /// Primary work queue name.
    pub redis_queue_name: String,

    /// Dead letter queue name.
    pub redis_dlq_name: String,

    /// Terminal-failure threshold: a reading is failed once
    /// `retry_count >= max_retries`.
    pub max_retries: u32,

    /// Base (seconds) of the `base^n` exponential backoff.
    pub retry_backoff_base: u32,

    /// Tick between polls when the queue blocks.
    pub dequeue_poll_interval: Duration,

    /// How long a single `DequeueBlocking` call may wait.
    pub dequeue_block_timeout: Duration,

    /// Downstream HTTP call timeout.
    pub http_timeout: Duration,

    /// Number of parallel delivery workers drawing from the same queue.
    pub worker_count: u32,

    /// Downstream receiver host.
    pub client_host: String,

    /// Downstream receiver port.
    pub client_port: u16,

    /// Shared secret: required from producers, sent downstream.
    pub server_secret_key: String,

    /// Name of the HTTP header the downstream API key is sent in.
    pub downstream_api_key_header: String,
}

/// Load configuration from environment variables with defaults.
///
/// Required: `DATABASE_URL`, `REDIS_URL`, `CLIENT_HOST`, `CLIENT_PORT`,
/// `SERVER_SECRET_KEY`. Everything else falls back to the defaults
/// documented on [`Config`]'s fields.
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let client_host = require_env!("CLIENT_HOST");
    let client_port_str = require_env!("CLIENT_PORT");
    let client_port: u16 = client_port_str
        .parse()
        .map_err(|e| anyhow!("Invalid CLIENT_PORT: {}", e))?;
    let server_secret_key = require_env!("SERVER_SECRET_KEY");

    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let port = parse_env_u32!("PORT", 8000) as u16;
    let redis_queue_name =
        env::var("REDIS_QUEUE_NAME").unwrap_or_else(|_| "sensor_data_queue".to_string());
    let redis_dlq_name =
        env::var("REDIS_DLQ_NAME").unwrap_or_else(|_| "sensor_data_dlq".to_string());
    let max_retries = parse_env_u32!("MAX_RETRIES", 3);
    let retry_backoff_base = parse_env_u32!("RETRY_BACKOFF_BASE", 1);
    let dequeue_poll_interval_ms = parse_env_u32!("DEQUEUE_POLL_INTERVAL_MS", 1000);
    let dequeue_block_timeout_ms = parse_env_u32!("DEQUEUE_BLOCK_TIMEOUT_MS", 1000);
    let http_timeout_ms = parse_env_u32!("HTTP_TIMEOUT_MS", 5000);
    let worker_count = parse_env_u32!("WORKER_COUNT", 1);
    let downstream_api_key_header =
        env::var("DOWNSTREAM_API_KEY_HEADER").unwrap_or_else(|_| "X-API-Key".to_string());

    Ok(Config {
        db_url,
        db_pool_max,
        redis_url,
        port,
        redis_queue_name,
        redis_dlq_name,
        max_retries,
        retry_backoff_base,
        dequeue_poll_interval: Duration::from_millis(dequeue_poll_interval_ms as u64),
        dequeue_block_timeout: Duration::from_millis(dequeue_block_timeout_ms as u64),
        http_timeout: Duration::from_millis(http_timeout_ms as u64),
        worker_count: worker_count.max(1),
        client_host,
        client_port,
        server_secret_key,
        downstream_api_key_header,
    })
}

impl Config {
    /// Downstream receiver base URL, e.g. `http://client:9000`.
    pub fn downstream_base_url(&self) -> String {
        format!("http://{}:{}", self.client_host, self.client_port)
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and the shared
    /// secret while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL             : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX              : {}", self.db_pool_max);
        tracing::info!("  REDIS_URL                : {}", self.redis_url);
        tracing::info!("  PORT                     : {}", self.port);
        tracing::info!("  REDIS_QUEUE_NAME         : {}", self.redis_queue_name);
        tracing::info!("  REDIS_DLQ_NAME           : {}", self.redis_dlq_name);
        tracing::info!("  MAX_RETRIES              : {}", self.max_retries);
        tracing::info!("  RETRY_BACKOFF_BASE       : {}", self.retry_backoff_base);
        tracing::info!(
            "  DEQUEUE_POLL_INTERVAL_MS : {}",
            self.dequeue_poll_interval.as_millis()
        );
        tracing::info!(
            "  DEQUEUE_BLOCK_TIMEOUT_MS : {}",
            self.dequeue_block_timeout.as_millis()
        );
        tracing::info!("  HTTP_TIMEOUT_MS          : {}", self.http_timeout.as_millis());
        tracing::info!("  WORKER_COUNT             : {}", self.worker_count);
        tracing::info!(
            "  CLIENT                   : {}",
            self.downstream_base_url()
        );
        tracing::info!("  SERVER_SECRET_KEY        : ****");
        tracing::info!(
            "  DOWNSTREAM_API_KEY_HEADER: {}",
            self.downstream_api_key_header
        );
    }
}
