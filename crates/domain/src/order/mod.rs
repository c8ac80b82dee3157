//! Order aggregate: checkout builder, status transition tables, and service.

mod builder;
mod service;
mod transitions;

pub use builder::{NewOrder, NewOrderItem, generate_order_number};
pub use service::OrderService;
pub use transitions::{
    PaymentEffect, TransitionPolicy, apply_order_status, order_transition, payment_transition,
};

use thiserror::Error;

/// Errors that can occur while building an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// A customer contact field is missing or blank.
    #[error("Customer {field} is required")]
    CustomerFieldRequired { field: &'static str },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i64 },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    /// The order total does not fit in the money type.
    #[error("Order total overflows")]
    TotalOverflow,
}
