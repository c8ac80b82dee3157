use common::ParseStatusError;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database aborted the transaction because of a concurrent writer
    /// (serialization failure or deadlock). Safe to retry from the start.
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// A row referenced another row that does not exist.
    #[error("Referenced {entity} does not exist: {detail}")]
    MissingReference { entity: &'static str, detail: String },

    /// A CHECK constraint rejected the write.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A stored value could not be decoded into its domain type.
    #[error("Decode error: {0}")]
    Decode(#[from] ParseStatusError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if re-running the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
