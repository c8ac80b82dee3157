//! Order service: checkout, reads, and fulfillment status changes.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, OrderStatus};
use store::{LineItemRecord, OrderDetails, OrderQuery, OrderRecord, Store, StoreError, StoreTx};

use crate::error::{DomainError, Result};
use crate::notify::{LogNotifier, Notifier, notify_order_placed, notify_status_changed};
use crate::unit_of_work::abort;

use super::{NewOrder, TransitionPolicy, apply_order_status};

/// Service for managing orders.
///
/// Generic over the [`Store`] port so the same code runs against PostgreSQL
/// and the in-memory store.
pub struct OrderService<S: Store> {
    store: S,
    policy: TransitionPolicy,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service with a permissive policy and a log-only notifier.
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: TransitionPolicy::default(),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Validates the checkout, then writes the order and all of its lines in
    /// one unit of work. An unknown product rolls everything back.
    #[tracing::instrument(skip(self, new_order), fields(items = new_order.items.len()))]
    pub async fn create_order(&self, new_order: NewOrder) -> Result<OrderDetails> {
        let (order, lines) = new_order.build(Utc::now())?;

        let mut tx = self.store.begin().await?;
        if let Err(e) = write_order(tx.as_mut(), &order, &lines).await {
            abort(tx, &e).await;
            return Err(e);
        }
        tx.commit().await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, order_number = %order.order_number, "order placed");

        let details = self.require(order.id).await?;
        notify_order_placed(self.notifier.as_ref(), &details).await;
        Ok(details)
    }

    /// Loads an order with its lines.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        Ok(self.store.order_details(order_id).await?)
    }

    /// Loads an order, failing with NotFound if it doesn't exist.
    pub async fn require(&self, order_id: OrderId) -> Result<OrderDetails> {
        self.get_order(order_id)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderDetails>> {
        Ok(self.store.list_orders(query).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn orders_for_customer(&self, email: &str) -> Result<Vec<OrderDetails>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(DomainError::Validation("email is required".to_string()));
        }
        Ok(self.store.list_orders(&OrderQuery::for_customer(email)).await?)
    }

    /// Moves an order along its fulfillment lifecycle.
    ///
    /// Cancellation has stock and payment side effects and is handled by the
    /// cancellation flow, so `Cancelled` is rejected here.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        requested: OrderStatus,
    ) -> Result<OrderDetails> {
        if requested == OrderStatus::Cancelled {
            return Err(DomainError::Validation(
                "cancelled orders must go through cancellation".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let previous = match change_status(tx.as_mut(), order_id, self.policy, requested).await {
            Ok(previous) => previous,
            Err(e) => {
                abort(tx, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        metrics::counter!(
            "order_status_transitions_total",
            "from" => previous.as_str(),
            "to" => requested.as_str()
        )
        .increment(1);

        let details = self.require(order_id).await?;
        notify_status_changed(self.notifier.as_ref(), &details, previous).await;
        Ok(details)
    }
}

async fn write_order(
    tx: &mut dyn StoreTx,
    order: &OrderRecord,
    lines: &[LineItemRecord],
) -> Result<()> {
    tx.insert_order(order).await?;
    for line in lines {
        tx.insert_line_item(order.id, line)
            .await
            .map_err(|e| match e {
                StoreError::MissingReference {
                    entity: "product", ..
                } => DomainError::not_found("product", line.product_id),
                other => DomainError::Store(other),
            })?;
    }
    Ok(())
}

async fn change_status(
    tx: &mut dyn StoreTx,
    order_id: OrderId,
    policy: TransitionPolicy,
    requested: OrderStatus,
) -> Result<OrderStatus> {
    let mut order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("order", order_id))?;
    let previous = order.status;
    apply_order_status(&mut order, policy, requested, Utc::now())?;
    tx.update_order(&order).await?;
    Ok(previous)
}
