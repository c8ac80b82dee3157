//! Best-effort customer notifications.
//!
//! Delivery failures never fail the operation that triggered them; callers
//! go through [`notify_order_placed`] and [`notify_status_changed`], which
//! log and swallow errors.

use async_trait::async_trait;
use common::OrderStatus;
use store::OrderDetails;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification channel (mail, SMS, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_placed(&self, order: &OrderDetails) -> Result<(), NotifyError>;

    async fn status_changed(
        &self,
        order: &OrderDetails,
        previous: OrderStatus,
    ) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_placed(&self, order: &OrderDetails) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %order.order.order_number,
            email = %order.order.customer.email,
            total = %order.order.total_amount,
            "order confirmation queued"
        );
        Ok(())
    }

    async fn status_changed(
        &self,
        order: &OrderDetails,
        previous: OrderStatus,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %order.order.order_number,
            from = %previous,
            to = %order.order.status,
            "status update queued"
        );
        Ok(())
    }
}

pub async fn notify_order_placed(notifier: &dyn Notifier, order: &OrderDetails) {
    if let Err(e) = notifier.order_placed(order).await {
        metrics::counter!("notifications_failed_total").increment(1);
        tracing::warn!(error = %e, order_id = %order.order.id, "order confirmation not sent");
    }
}

pub async fn notify_status_changed(
    notifier: &dyn Notifier,
    order: &OrderDetails,
    previous: OrderStatus,
) {
    if let Err(e) = notifier.status_changed(order, previous).await {
        metrics::counter!("notifications_failed_total").increment(1);
        tracing::warn!(error = %e, order_id = %order.order.id, "status update not sent");
    }
}
