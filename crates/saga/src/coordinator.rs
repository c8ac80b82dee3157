//! Coordinator for payment reconciliation and order cancellation.

use std::time::Instant;

use chrono::Utc;
use common::{OrderId, OrderStatus, PaymentStatus};
use domain::{
    DomainError, OrderService, PaymentEffect, append_note, apply_order_status,
    notify_status_changed, payment_transition, unit_of_work::abort,
};
use store::{OrderDetails, Store, StoreTx};

use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::steps::{STEP_RELEASE_STOCK, STEP_RESERVE_STOCK, apply_all, compensation, sale_plan};

/// What a committed unit of work did, for metrics and notifications.
struct Outcome {
    previous_status: OrderStatus,
    previous_payment: PaymentStatus,
    effect: PaymentEffect,
    units: u64,
}

/// Drives the multi-row order mutations: payment status changes that move
/// stock, and cancellations that undo them.
///
/// Each operation is one unit of work: the order row is locked, stock rows
/// are moved with guarded updates, and everything commits together or not at
/// all. Units of work aborted by a concurrent writer are retried under the
/// configured [`RetryPolicy`].
pub struct ReconciliationCoordinator<S: Store> {
    orders: OrderService<S>,
    retry: RetryPolicy,
}

impl<S: Store> ReconciliationCoordinator<S> {
    /// Creates a new coordinator around an order service.
    pub fn new(orders: OrderService<S>) -> Self {
        Self {
            orders,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    /// Changes an order's payment status.
    ///
    /// Entering `paid` decrements stock for every line; a repeated `paid` is a
    /// no-op; leaving `paid` for `refunded` returns the stock. If any line is
    /// short, nothing is written.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        order_id: OrderId,
        requested: PaymentStatus,
    ) -> Result<OrderDetails> {
        let started = Instant::now();
        let result = self
            .retry
            .run("payment_reconciliation", || {
                self.try_update_payment(order_id, requested)
            })
            .await;
        metrics::histogram!("reconciliation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::counter!("payment_reconciliations_total", "outcome" => "failed")
                    .increment(1);
                tracing::warn!(%order_id, error = %e, "payment reconciliation failed");
                return Err(e);
            }
        };

        metrics::counter!("payment_reconciliations_total", "outcome" => "committed").increment(1);
        match outcome.effect {
            PaymentEffect::Reserve => {
                metrics::counter!("stock_units_decremented_total").increment(outcome.units);
            }
            PaymentEffect::Release => {
                metrics::counter!("stock_units_restored_total").increment(outcome.units);
            }
            PaymentEffect::None => {}
        }
        tracing::info!(
            %order_id,
            from = %outcome.previous_payment,
            to = %requested,
            units = outcome.units,
            "payment status updated"
        );

        Ok(self.orders.require(order_id).await?)
    }

    /// Cancels an order, returning its stock if it had been paid.
    ///
    /// Delivered, completed and already-cancelled orders are rejected without
    /// any write.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<OrderDetails> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let outcome = self
            .retry
            .run("order_cancellation", || {
                self.try_cancel(order_id, reason.as_deref())
            })
            .await?;

        metrics::counter!(
            "order_cancellations_total",
            "refunded" => if outcome.effect == PaymentEffect::Release { "true" } else { "false" }
        )
        .increment(1);
        if outcome.units > 0 {
            metrics::counter!("stock_units_restored_total").increment(outcome.units);
        }
        tracing::info!(
            %order_id,
            from = %outcome.previous_status,
            units_restored = outcome.units,
            "order cancelled"
        );

        let details = self.orders.require(order_id).await?;
        notify_status_changed(
            self.orders.notifier().as_ref(),
            &details,
            outcome.previous_status,
        )
        .await;
        Ok(details)
    }

    /// Changes fulfillment status. `Cancelled` is routed through
    /// [`Self::cancel_order`] so its stock and payment effects are applied.
    pub async fn update_status(
        &self,
        order_id: OrderId,
        requested: OrderStatus,
    ) -> Result<OrderDetails> {
        if requested == OrderStatus::Cancelled {
            return self.cancel_order(order_id, None).await;
        }
        Ok(self.orders.update_status(order_id, requested).await?)
    }

    async fn try_update_payment(
        &self,
        order_id: OrderId,
        requested: PaymentStatus,
    ) -> Result<Outcome> {
        let mut tx = self.orders.store().begin().await?;
        match reconcile_payment(tx.as_mut(), order_id, requested).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                abort(tx, &e).await;
                Err(e)
            }
        }
    }

    async fn try_cancel(&self, order_id: OrderId, reason: Option<&str>) -> Result<Outcome> {
        let mut tx = self.orders.store().begin().await?;
        match cancel(tx.as_mut(), order_id, reason, self.orders.policy()).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                abort(tx, &e).await;
                Err(e)
            }
        }
    }
}

async fn reconcile_payment(
    tx: &mut dyn StoreTx,
    order_id: OrderId,
    requested: PaymentStatus,
) -> Result<Outcome> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("order", order_id))?;
    let previous_payment = order.payment_status;
    let effect = payment_transition(previous_payment, requested)?;
    if effect == PaymentEffect::Reserve && order.status == OrderStatus::Cancelled {
        return Err(DomainError::StateConflict(format!(
            "order {} is cancelled and cannot be paid",
            order.order_number
        ))
        .into());
    }

    order.payment_status = requested;
    order.updated_at = Utc::now();
    tx.update_order(&order).await?;

    let units = match effect {
        PaymentEffect::None => 0,
        PaymentEffect::Reserve => {
            let plan = sale_plan(&tx.line_items(order_id).await?);
            tracing::debug!(step = STEP_RESERVE_STOCK, movements = plan.len());
            apply_all(tx, &plan).await?
        }
        PaymentEffect::Release => {
            let plan = sale_plan(&tx.line_items(order_id).await?);
            tracing::debug!(step = STEP_RELEASE_STOCK, movements = plan.len());
            apply_all(tx, &compensation(&plan)).await?
        }
    };

    Ok(Outcome {
        previous_status: order.status,
        previous_payment,
        effect,
        units,
    })
}

async fn cancel(
    tx: &mut dyn StoreTx,
    order_id: OrderId,
    reason: Option<&str>,
    policy: domain::TransitionPolicy,
) -> Result<Outcome> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("order", order_id))?;
    if order.status == OrderStatus::Cancelled {
        return Err(DomainError::StateConflict(format!(
            "order {} is already cancelled",
            order.order_number
        ))
        .into());
    }

    let previous_status = order.status;
    let previous_payment = order.payment_status;
    let now = Utc::now();
    apply_order_status(&mut order, policy, OrderStatus::Cancelled, now)?;

    let effect = if previous_payment == PaymentStatus::Paid {
        let effect = payment_transition(previous_payment, PaymentStatus::Refunded)?;
        order.payment_status = PaymentStatus::Refunded;
        effect
    } else {
        PaymentEffect::None
    };
    if let Some(reason) = reason {
        order.notes = Some(append_note(
            order.notes.as_deref(),
            &format!("Cancellation reason: {reason}"),
        ));
    }
    tx.update_order(&order).await?;

    let units = if effect == PaymentEffect::Release {
        let plan = sale_plan(&tx.line_items(order_id).await?);
        tracing::debug!(step = STEP_RELEASE_STOCK, movements = plan.len());
        apply_all(tx, &compensation(&plan)).await?
    } else {
        0
    };

    Ok(Outcome {
        previous_status,
        previous_payment,
        effect,
        units,
    })
}
