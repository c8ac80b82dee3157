//! Multi-row order mutations with compensation.
//!
//! Two flows move stock:
//! 1. Payment reconciliation: an order entering `paid` decrements stock for
//!    every line, guarded so stock never goes negative.
//! 2. Cancellation: a paid order being cancelled is refunded and every
//!    decrement is undone in reverse order.
//!
//! Each flow is a single storage transaction. A failure at any line rolls
//! back every earlier line, and conflicts reported by the database are
//! retried under a bounded [`RetryPolicy`].

pub mod coordinator;
pub mod error;
pub mod retry;
pub mod steps;

pub use coordinator::ReconciliationCoordinator;
pub use error::{Result, SagaError};
pub use retry::RetryPolicy;
pub use steps::{Direction, StockMovement, compensation, sale_plan};
