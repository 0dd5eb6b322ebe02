use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use tooldeck_core::event::EVENT_BATCH_MAX;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// One event in a batch failed its per-kind schema. The whole batch
    /// is rejected; nothing is written.
    #[error("invalid event at index {index}: {message}")]
    InvalidEvent {
        index: usize,
        field: &'static str,
        message: String,
    },

    #[error("batch too large: {0} events")]
    BatchTooLarge(usize),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, field) = match &self {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
                None,
            ),
            AppError::InvalidEvent {
                index,
                field,
                message,
            } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("events[{index}]: {message}"),
                Some(*field),
            ),
            AppError::BatchTooLarge(count) => (
                StatusCode::BAD_REQUEST,
                "batch_too_large",
                format!("Batch of {count} exceeds maximum of {EVENT_BATCH_MAX} events"),
                None,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                None,
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                    "field": field
                }
            })),
        )
            .into_response()
    }
}
