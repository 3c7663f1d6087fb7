//! Error taxonomy shared by the ingest path and the delivery worker.
//!
//! Ingest-path variants render an HTTP envelope via [`IntoResponse`]. The
//! worker never surfaces these to a caller; it logs and drives the reading
//! state machine instead (see [`crate::worker`]).

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Serialize)]
struct ErrorEnvelope {
    code: u16,
    status: bool,
    message: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Decode(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) | AppError::Queue(_) | AppError::Delivery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorEnvelope {
            code: status.as_u16(),
            status: false,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// `Json<T>` extractor wrapper that turns a [`JsonRejection`] (missing
/// `Content-Type`, malformed body, wrong shape) into `AppError::Validation`
/// so every ingest failure — decode included — renders the same envelope
/// instead of Axum's default rejection body.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(ValidatedJson(value))
    }
}

/// Errors from the reading/catalog stores. Kept distinct from [`AppError`]
/// so store implementations stay ignorant of HTTP; callers convert at the
/// ingest/worker boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => AppError::NotFound("resource not found".to_string()),
            StoreError::Backend(msg) => AppError::Storage(msg),
        }
    }
}

/// Errors from the work queue backend.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Backend(msg) => AppError::Queue(msg),
        }
    }
}
