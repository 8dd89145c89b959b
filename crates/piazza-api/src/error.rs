use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so handlers can return `Result<T, ApiError>`;
/// every error body carries a short human-readable `message`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing input (400)
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid token (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not a participant/owner (403)
    #[error("{0}")]
    Forbidden(String),

    /// Referenced entity absent (404)
    #[error("{0}")]
    NotFound(String),

    /// Duplicate where uniqueness is required (409)
    #[error("{0}")]
    Conflict(String),

    /// Unexpected store/transport failure (500), generic message only
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Wrap a `spawn_blocking` join failure.
    pub fn join(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
