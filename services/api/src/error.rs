//! services/api/src/error.rs
//!
//! Defines the error types for the API service: `ApiError` for startup and
//! `HttpError` for request handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bookflow_core::{PortError, ServiceError};
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying database migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// An error returned from a request handler, rendered as `{ "error": message }`.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::ExternalLookupFailed(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details stay in the log.
        let message = match err {
            ServiceError::Internal(detail) => {
                error!("Internal service error: {}", detail);
                "Internal server error".to_string()
            }
            ServiceError::InvalidInput(msg)
            | ServiceError::NotFound(msg)
            | ServiceError::Forbidden(msg)
            | ServiceError::Conflict(msg)
            | ServiceError::StorageUnavailable(msg)
            | ServiceError::ExternalLookupFailed(msg) => msg,
        };

        Self { status, message }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::StorageUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::ExternalLookupFailed("x".into()), StatusCode::BAD_GATEWAY),
            (ServiceError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(HttpError::from(err).status, status);
        }
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = HttpError::from(ServiceError::Internal("connection refused on 10.0.0.3".into()));
        assert_eq!(err.message, "Internal server error");

        let err = HttpError::from(ServiceError::Conflict("Book already in your library".into()));
        assert_eq!(err.message, "Book already in your library");
    }
}
