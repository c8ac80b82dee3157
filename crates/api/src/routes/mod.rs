//! HTTP handlers, one module per resource.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod stock;
pub mod transactions;
