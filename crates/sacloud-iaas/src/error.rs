//! Provider API error types

use thiserror::Error;

/// Errors surfaced by provider operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IaasError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The target is locked by another operation (HTTP 409/423/503 class).
    /// Retrying after a short wait is expected to succeed.
    #[error("Resource is busy: {0}")]
    Busy(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl IaasError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        IaasError::Api {
            status,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            IaasError::NotFound(_) => true,
            IaasError::Api { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Whether a poll loop may keep going after this error
    pub fn is_transient(&self) -> bool {
        match self {
            IaasError::Busy(_) => true,
            IaasError::Api { status, .. } => matches!(status, 409 | 423 | 503),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IaasError>;
