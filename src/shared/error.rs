//! Application Error Types
//!
//! Centralized error handling with Axum integration.
//!
//! The first four variants form the core taxonomy of the id generator and
//! the write-behind pipeline; the remaining ones wrap collaborator failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid generator or worker configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The wall clock moved backwards relative to the last minted id.
    #[error("Clock moved backwards: last timestamp {last_ms}, current {current_ms}")]
    ClockSkew { last_ms: u64, current_ms: u64 },

    /// The event log could not be reached during append or read.
    #[error("Event log unavailable: {0}")]
    TransientLog(String),

    /// A single event could not be applied to durable storage.
    #[error("Failed to apply event {event_id}: {reason}")]
    ApplyFailure { event_id: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Whether the caller may retry the whole operation after a delay.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ClockSkew { .. }
                | AppError::TransientLog(_)
                | AppError::Redis(_)
                | AppError::Database(_)
        )
    }

    /// Wrap any log backend failure as a transient log error.
    pub fn transient_log(err: impl std::fmt::Display) -> Self {
        AppError::TransientLog(err.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, 10007, msg.clone()),
            AppError::ClockSkew { .. } => {
                tracing::error!(error = %self, "Id generation refused");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    10008,
                    "Id generation temporarily unavailable".into(),
                )
            }
            AppError::TransientLog(msg) => {
                tracing::warn!("Event log error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    10009,
                    "Mutation not durable, retry the action".into(),
                )
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::ApplyFailure { event_id, reason } => {
                tracing::error!(event_id = %event_id, "Apply failure: {}", reason);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, 10000, "Cache unavailable".into())
            }
        };

        let body = ErrorResponse {
            code,
            message,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}
