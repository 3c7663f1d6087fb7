use std::sync::Arc;

use axum::{middleware, Router};

use crate::auth::require_api_key;
use crate::config::Config;
use crate::ingest::IngestService;

mod health;
mod ingest;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub ingest_service: IngestService,
    pub config: Arc<Config>,
}

// ---

pub fn router(state: AppState) -> Router {
    // ---
    let protected = Router::new()
        .merge(ingest::router())
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            require_api_key,
        ));

    Router::new()
        .merge(health::router())
        .merge(protected)
        .with_state(state)
}
