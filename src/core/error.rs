//! Error type system for the bookshelf backend
//!
//! Every handler-level failure is expressed as an [`ApiError`] variant and
//! mapped to an HTTP status code plus a JSON `{message}` body at the request
//! boundary. Internal details (database errors, I/O errors) are logged and
//! never leak to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Main error type for the bookshelf system
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task error: {0}")]
    Task(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Task(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type name for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Validation",
            ApiError::Auth(_) => "Auth",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Config(_) => "Config",
            ApiError::Database(_) => "Database",
            ApiError::Io(_) => "Io",
            ApiError::Task(_) => "Task",
            ApiError::Internal(_) => "Internal",
        }
    }

    /// Message presented to the client.
    ///
    /// 5xx variants collapse to a generic message; their detail only reaches
    /// the logs.
    fn client_message(&self) -> String {
        match self {
            ApiError::Validation(m)
            | ApiError::Auth(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m) => m.clone(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// Error response body for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        if status_code.is_server_error() {
            tracing::error!(
                error_type = self.error_type(),
                status_code = %status_code,
                "Request failed: {}",
                self
            );
        } else {
            tracing::warn!(
                error_type = self.error_type(),
                status_code = %status_code,
                "Request rejected: {}",
                self
            );
        }

        let body = ErrorResponse {
            message: self.client_message(),
        };

        (status_code, Json(body)).into_response()
    }
}

/// Result type alias for operations that can fail with ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            ApiError::Validation("test".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Auth("test".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("test".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("test".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("test".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Database(rusqlite::Error::InvalidQuery).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_types() {
        assert_eq!(ApiError::Validation("x".into()).error_type(), "Validation");
        assert_eq!(ApiError::Conflict("x".into()).error_type(), "Conflict");
        assert_eq!(ApiError::Task("x".into()).error_type(), "Task");
    }

    #[test]
    fn test_client_messages_hide_internals() {
        let err = ApiError::Database(rusqlite::Error::InvalidQuery);
        assert_eq!(err.client_message(), "Internal server error");

        let err = ApiError::NotFound("Book not found".into());
        assert_eq!(err.client_message(), "Book not found");
    }
}
