//! Saga error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while reconciling payments or compensating orders.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl SagaError {
    /// Returns true if re-running the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SagaError::Domain(e) => e.is_retryable(),
            SagaError::Store(e) => e.is_retryable(),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
