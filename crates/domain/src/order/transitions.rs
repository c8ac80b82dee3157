//! Status transition tables.
//!
//! Every status change is looked up in an explicit `(current, requested)`
//! table. A missing entry means the transition is rejected.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{OrderStatus, PaymentStatus};
use serde::{Deserialize, Serialize};
use store::OrderRecord;

use crate::error::{DomainError, Result};

use OrderStatus::{Cancelled, Completed, Delivered, Placed, Processing, Shipped};

/// How strictly fulfillment transitions are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Any forward move is allowed, e.g. `placed -> delivered`.
    #[default]
    Permissive,
    /// Only adjacent moves are allowed.
    Strict,
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            other => Err(format!("unknown status policy: {other}")),
        }
    }
}

const PERMISSIVE: &[(OrderStatus, OrderStatus)] = &[
    (Placed, Processing),
    (Placed, Shipped),
    (Placed, Delivered),
    (Placed, Completed),
    (Placed, Cancelled),
    (Processing, Shipped),
    (Processing, Delivered),
    (Processing, Completed),
    (Processing, Cancelled),
    (Shipped, Delivered),
    (Shipped, Completed),
    (Shipped, Cancelled),
];

const STRICT: &[(OrderStatus, OrderStatus)] = &[
    (Placed, Processing),
    (Placed, Cancelled),
    (Processing, Shipped),
    (Processing, Completed),
    (Processing, Cancelled),
    (Shipped, Delivered),
    (Shipped, Completed),
    (Shipped, Cancelled),
];

/// Looks up a fulfillment transition. Terminal states have no outgoing
/// entries under either policy.
pub fn order_transition(
    policy: TransitionPolicy,
    current: OrderStatus,
    requested: OrderStatus,
) -> Result<OrderStatus> {
    let table = match policy {
        TransitionPolicy::Permissive => PERMISSIVE,
        TransitionPolicy::Strict => STRICT,
    };
    if table.contains(&(current, requested)) {
        Ok(requested)
    } else {
        Err(DomainError::InvalidTransition {
            kind: "order status",
            from: current.to_string(),
            to: requested.to_string(),
        })
    }
}

/// Stock effect attached to a payment status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEffect {
    /// Status changes, stock untouched.
    None,
    /// Entering `paid`: decrement stock for every line.
    Reserve,
    /// Leaving `paid`: return stock for every line.
    Release,
}

const PAYMENT: &[(PaymentStatus, PaymentStatus, PaymentEffect)] = &[
    (PaymentStatus::Pending, PaymentStatus::Paid, PaymentEffect::Reserve),
    (PaymentStatus::Pending, PaymentStatus::Failed, PaymentEffect::None),
    (PaymentStatus::Failed, PaymentStatus::Pending, PaymentEffect::None),
    (PaymentStatus::Failed, PaymentStatus::Paid, PaymentEffect::Reserve),
    (PaymentStatus::Paid, PaymentStatus::Paid, PaymentEffect::None),
    (PaymentStatus::Paid, PaymentStatus::Refunded, PaymentEffect::Release),
];

/// Looks up a payment transition and the stock effect it carries.
///
/// Stock is held exactly while the payment status is `paid`, so a repeated
/// `paid` is a no-op and leaving `paid` releases what was reserved.
pub fn payment_transition(current: PaymentStatus, requested: PaymentStatus) -> Result<PaymentEffect> {
    PAYMENT
        .iter()
        .find(|(from, to, _)| *from == current && *to == requested)
        .map(|(_, _, effect)| *effect)
        .ok_or_else(|| DomainError::InvalidTransition {
            kind: "payment status",
            from: current.to_string(),
            to: requested.to_string(),
        })
}

/// Applies a fulfillment transition to an order header, stamping
/// `delivered_at` when the order is delivered.
pub fn apply_order_status(
    order: &mut OrderRecord,
    policy: TransitionPolicy,
    requested: OrderStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    order.status = order_transition(policy, order.status, requested)?;
    if order.status == Delivered {
        order.delivered_at = Some(now);
    }
    order.updated_at = now;
    Ok(())
}
