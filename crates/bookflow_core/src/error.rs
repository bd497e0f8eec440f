//! crates/bookflow_core/src/error.rs
//!
//! The error kinds returned by the application services.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("External lookup failed: {0}")]
    ExternalLookupFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<PortError> for ServiceError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            PortError::Conflict(msg) => ServiceError::Conflict(msg),
            PortError::Unauthorized => ServiceError::Forbidden("unauthorized".to_string()),
            PortError::Unavailable(msg) | PortError::Unexpected(msg) => ServiceError::Internal(msg),
        }
    }
}
