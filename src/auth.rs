//! Producer authentication: a single shared-secret header check.
//!
//! Full authentication middleware (JWT, API key, dual-mode) is treated as
//! an external collaborator; this is the minimal boundary implementation
//! needed for the ingest endpoint to require a valid `X-API-Key` header.
//! Mirrors `middleware/secret_key.go`'s single-secret comparison path; its
//! JWT/dual-mode paths are out of scope here.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::Config;

#[derive(Serialize)]
struct ErrorEnvelope {
    code: u16,
    status: bool,
    message: &'static str,
}

fn unauthorized() -> Response {
    let body = ErrorEnvelope {
        code: 401,
        status: false,
        message: "missing or invalid API key",
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Reject requests whose `X-API-Key` header does not match
/// `config.server_secret_key`.
pub async fn require_api_key(
    State(config): State<Arc<Config>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let provided = headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided.is_empty() || provided != config.server_secret_key {
        return unauthorized();
    }

    next.run(request).await
}
