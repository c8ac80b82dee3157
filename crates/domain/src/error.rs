//! Domain error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An order failed builder validation.
    #[error("Order error: {0}")]
    Order(OrderError),

    /// Request input was rejected before touching storage.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The transition table rejected a status change.
    #[error("Invalid {kind} transition from {from} to {to}")]
    InvalidTransition {
        kind: &'static str,
        from: String,
        to: String,
    },

    /// The operation conflicts with the entity's current state.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// A conditional stock decrement matched no row.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: i64,
    },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if the failed unit of work may succeed when re-run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::Store(e) if e.is_retryable())
    }
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
