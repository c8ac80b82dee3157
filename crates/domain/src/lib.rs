//! Domain layer for the commerce core.
//!
//! This crate provides:
//! - the checkout builder that validates input and recomputes totals
//! - explicit transition tables for order and payment status
//! - order, stock and ledger services generic over the [`store::Store`] port

pub mod error;
pub mod ledger;
pub mod note;
pub mod notify;
pub mod order;
pub mod stock;
pub mod unit_of_work;

pub use error::{DomainError, Result};
pub use ledger::{LedgerService, NewPayment, generate_transaction_number};
pub use note::append_note;
pub use notify::{LogNotifier, Notifier, NotifyError, notify_order_placed, notify_status_changed};
pub use order::{
    NewOrder, NewOrderItem, OrderError, OrderService, PaymentEffect, TransitionPolicy,
    apply_order_status, generate_order_number, order_transition, payment_transition,
};
pub use stock::{Restock, StockChange, StockService};
