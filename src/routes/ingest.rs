//! `POST /sensors`: the producer-facing ingest endpoint.
//!
//! Mirrors `controller/sensorctrl/sensor_ingest_controller.go`: parse
//! body, delegate to the domain/service layer, map its result onto the
//! `{code, status, message}` envelope.

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use serde::Serialize;

use crate::error::ValidatedJson;
use crate::models::IngestRequest;
use crate::routes::AppState;

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/sensors", post(handler))
}

#[derive(Serialize)]
struct IngestResponse {
    code: u16,
    status: bool,
    message: &'static str,
}

/// Handle `POST /sensors`.
///
/// The body is parsed via [`ValidatedJson`] rather than the bare `Json`
/// extractor so a malformed or wrong-shaped body is rejected with the same
/// `{code, status, message}` envelope as every other ingest failure,
/// instead of Axum's default rejection response.
async fn handler(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<IngestRequest>,
) -> impl IntoResponse {
    // ---
    match state.ingest_service.ingest(request).await {
        Ok(_reading) => (
            axum::http::StatusCode::OK,
            Json(IngestResponse {
                code: 200,
                status: true,
                message: "Success",
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
