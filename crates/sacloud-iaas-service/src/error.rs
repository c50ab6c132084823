//! Service layer error types

use sacloud_iaas::IaasError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Rejected before any provider call was made
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("disk plan[{plan}:{size_gb}GB] is not found")]
    DiskPlanNotFound { plan: String, size_gb: u64 },

    #[error("server plan not found: {0}")]
    ServerPlanNotFound(String),

    #[error("archive not found: {0}")]
    ArchiveNotFound(String),

    /// The resource is in a state the requested operation cannot run in
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("resource creation failed after {retries} attempts: {last}")]
    RetryExceeded { retries: u32, last: String },

    #[error("resource {id} entered the failed state")]
    ResourceFailed { id: String },

    #[error("timed out after {0:?} waiting for resource state")]
    Timeout(std::time::Duration),

    #[error("wait cancelled")]
    Cancelled,

    #[error(transparent)]
    Api(#[from] IaasError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ServiceError::InvalidState(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::Api(e) => e.is_not_found(),
            ServiceError::DiskPlanNotFound { .. }
            | ServiceError::ServerPlanNotFound(_)
            | ServiceError::ArchiveNotFound(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// An operation that stopped part way
///
/// `partial` is whatever had been built when `error` happened: a resource ID
/// to clean up, the disks attached so far, or the last observed state.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{error}")]
pub struct PartialFailure<T> {
    pub partial: T,
    pub error: ServiceError,
}

impl<T> PartialFailure<T> {
    pub fn new(partial: T, error: impl Into<ServiceError>) -> Self {
        Self {
            partial,
            error: error.into(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PartialFailure<U> {
        PartialFailure {
            partial: f(self.partial),
            error: self.error,
        }
    }

    pub fn into_error(self) -> ServiceError {
        self.error
    }
}

impl<T> PartialFailure<Option<T>> {
    /// A failure with nothing to show for it
    pub fn empty(error: impl Into<ServiceError>) -> Self {
        Self::new(None, error)
    }
}

impl<T> From<PartialFailure<T>> for ServiceError {
    fn from(failure: PartialFailure<T>) -> Self {
        failure.error
    }
}
