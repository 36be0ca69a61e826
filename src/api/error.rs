//! API Error Types
//!
//! Errors leave the service as `{status: "error", message, request_id}`
//! with a matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("{0}")]
    Validation(String),

    /// Resource not found
    #[error("{0}")]
    NotFound(String),

    /// Document store error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Store(StoreError::InvalidDocument(_) | StoreError::InvalidReading(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_DOCUMENT")
            }
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        };

        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::debug!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            status: "error",
            message: self.to_string(),
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
