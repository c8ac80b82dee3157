//! Integration tests for payment reconciliation and cancellation.

use std::sync::Arc;

use common::{Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId};
use domain::{DomainError, NewOrder, OrderService};
use saga::{ReconciliationCoordinator, RetryPolicy, SagaError};
use store::{CustomerInfo, InMemoryStore, OrderDetails, ProductRecord, Store};

struct TestHarness {
    store: InMemoryStore,
    coordinator: Arc<ReconciliationCoordinator<InMemoryStore>>,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    fn with_retry(retry: RetryPolicy) -> Self {
        let store = InMemoryStore::new();
        let coordinator =
            ReconciliationCoordinator::new(OrderService::new(store.clone())).with_retry(retry);
        Self {
            store,
            coordinator: Arc::new(coordinator),
        }
    }

    async fn product(&self, name: &str, stock: i64) -> ProductId {
        let product = ProductRecord::new(name, Money::from_cents(100)).with_stock(stock);
        let id = product.id;
        self.store.insert_product(product).await;
        id
    }

    async fn stock(&self, id: ProductId) -> (i64, i64) {
        let p = self.store.product(id).await.unwrap().unwrap();
        (p.stock, p.total_sold)
    }

    async fn order(&self, lines: &[(ProductId, i64)]) -> OrderDetails {
        let customer = CustomerInfo {
            name: "Otieno Ouma".to_string(),
            email: "otieno@example.com".to_string(),
            phone: "0744000000".to_string(),
            address: "Eldoret".to_string(),
        };
        let new_order = lines
            .iter()
            .fold(NewOrder::new(customer, PaymentMethod::Mpesa), |o, (id, qty)| {
                o.item(*id, *qty, Money::from_cents(100))
            });
        self.coordinator
            .orders()
            .create_order(new_order)
            .await
            .unwrap()
    }

    async fn pay(&self, order_id: OrderId) -> saga::Result<OrderDetails> {
        self.coordinator
            .update_payment_status(order_id, PaymentStatus::Paid)
            .await
    }
}

#[test]
fn coordinator_futures_are_send() {
    fn assert_send<T: Send>(_: &T) {}
    let h = TestHarness::new();
    let id = OrderId::new();
    assert_send(&h.coordinator.update_payment_status(id, PaymentStatus::Paid));
    assert_send(&h.coordinator.cancel_order(id, None));
    assert_send(&h.coordinator.update_status(id, OrderStatus::Shipped));
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn a_checkout_totals_and_defaults() {
        let h = TestHarness::new();
        let p1 = h.product("P1", 5).await;
        let order = h.order(&[(p1, 2)]).await;

        assert_eq!(order.order.total_amount, Money::from_cents(200));
        assert_eq!(order.order.status, OrderStatus::Placed);
        assert_eq!(order.order.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn b_payment_decrements_stock() {
        let h = TestHarness::new();
        let p1 = h.product("P1", 5).await;
        let order = h.order(&[(p1, 2)]).await;

        let paid = h.pay(order.order.id).await.unwrap();
        assert_eq!(paid.order.payment_status, PaymentStatus::Paid);
        assert_eq!(h.stock(p1).await, (3, 2));
    }

    #[tokio::test]
    async fn c_second_payment_is_a_no_op() {
        let h = TestHarness::new();
        let p1 = h.product("P1", 5).await;
        let order = h.order(&[(p1, 2)]).await;

        h.pay(order.order.id).await.unwrap();
        h.pay(order.order.id).await.unwrap();
        assert_eq!(h.stock(p1).await, (3, 2));
    }

    #[tokio::test]
    async fn d_cancel_after_payment_restores_stock() {
        let h = TestHarness::new();
        let p1 = h.product("P1", 5).await;
        let order = h.order(&[(p1, 2)]).await;
        h.pay(order.order.id).await.unwrap();

        let cancelled = h
            .coordinator
            .cancel_order(order.order.id, Some("customer request".to_string()))
            .await
            .unwrap();

        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.order.payment_status, PaymentStatus::Refunded);
        assert!(
            cancelled
                .order
                .notes
                .as_deref()
                .unwrap()
                .contains("Cancellation reason: customer request")
        );
        assert_eq!(h.stock(p1).await, (5, 0));
    }

    #[tokio::test]
    async fn e_short_stock_aborts_without_changes() {
        let h = TestHarness::new();
        let p1 = h.product("P1", 3).await;
        let order = h.order(&[(p1, 10)]).await;

        let err = h.pay(order.order.id).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::Domain(DomainError::InsufficientStock {
                requested: 10,
                available: 3,
                ..
            })
        ));

        assert_eq!(h.stock(p1).await, (3, 0));
        let reread = h.coordinator.orders().require(order.order.id).await.unwrap();
        assert_eq!(reread.order.payment_status, PaymentStatus::Pending);
    }
}

mod reconciliation {
    use super::*;

    #[tokio::test]
    async fn one_short_line_aborts_every_line() {
        let h = TestHarness::new();
        let plenty = h.product("Plenty", 50).await;
        let scarce = h.product("Scarce", 1).await;
        let order = h.order(&[(plenty, 5), (scarce, 2)]).await;

        assert!(h.pay(order.order.id).await.is_err());
        assert_eq!(h.stock(plenty).await, (50, 0));
        assert_eq!(h.stock(scarce).await, (1, 0));
    }

    #[tokio::test]
    async fn failed_then_paid_decrements_once() {
        let h = TestHarness::new();
        let p = h.product("P", 4).await;
        let order = h.order(&[(p, 1)]).await;

        h.coordinator
            .update_payment_status(order.order.id, PaymentStatus::Failed)
            .await
            .unwrap();
        assert_eq!(h.stock(p).await, (4, 0));

        h.pay(order.order.id).await.unwrap();
        assert_eq!(h.stock(p).await, (3, 1));
    }

    #[tokio::test]
    async fn refund_via_payment_status_releases_stock() {
        let h = TestHarness::new();
        let p = h.product("P", 4).await;
        let order = h.order(&[(p, 3)]).await;
        h.pay(order.order.id).await.unwrap();

        let refunded = h
            .coordinator
            .update_payment_status(order.order.id, PaymentStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(refunded.order.payment_status, PaymentStatus::Refunded);
        assert_eq!(h.stock(p).await, (4, 0));
    }

    #[tokio::test]
    async fn refunded_is_terminal() {
        let h = TestHarness::new();
        let p = h.product("P", 4).await;
        let order = h.order(&[(p, 1)]).await;
        h.pay(order.order.id).await.unwrap();
        h.coordinator
            .update_payment_status(order.order.id, PaymentStatus::Refunded)
            .await
            .unwrap();

        let err = h.pay(order.order.id).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::Domain(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(h.stock(p).await, (4, 0));
    }

    #[tokio::test]
    async fn cancelled_order_cannot_be_paid() {
        let h = TestHarness::new();
        let p = h.product("P", 4).await;
        let order = h.order(&[(p, 1)]).await;
        h.coordinator.cancel_order(order.order.id, None).await.unwrap();

        let err = h.pay(order.order.id).await.unwrap_err();
        assert!(matches!(err, SagaError::Domain(DomainError::StateConflict(_))));
        assert_eq!(h.stock(p).await, (4, 0));
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let h = TestHarness::new();
        let err = h.pay(OrderId::new()).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::Domain(DomainError::NotFound { entity: "order", .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_payments_never_oversell() {
        let h = TestHarness::new();
        let p = h.product("Hot item", 5).await;
        let mut orders = Vec::new();
        for _ in 0..10 {
            orders.push(h.order(&[(p, 1)]).await.order.id);
        }

        let handles: Vec<_> = orders
            .into_iter()
            .map(|id| {
                let coordinator = Arc::clone(&h.coordinator);
                tokio::spawn(async move {
                    coordinator
                        .update_payment_status(id, PaymentStatus::Paid)
                        .await
                })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert!(matches!(
                    e,
                    SagaError::Domain(DomainError::InsufficientStock { .. })
                )),
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(h.stock(p).await, (0, 5));
    }

    #[tokio::test]
    async fn conflicts_are_retried() {
        let h = TestHarness::with_retry(RetryPolicy::new(3, std::time::Duration::ZERO));
        let p = h.product("P", 5).await;
        let order = h.order(&[(p, 2)]).await;

        h.store.fail_next_commits(2);
        h.pay(order.order.id).await.unwrap();
        assert_eq!(h.stock(p).await, (3, 2));
    }

    #[tokio::test]
    async fn exhausted_retries_leave_no_trace() {
        let h = TestHarness::with_retry(RetryPolicy::none());
        let p = h.product("P", 5).await;
        let order = h.order(&[(p, 2)]).await;

        h.store.fail_next_commits(1);
        let err = h.pay(order.order.id).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(h.stock(p).await, (5, 0));
    }
}

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn unpaid_cancel_leaves_stock_alone() {
        let h = TestHarness::new();
        let p = h.product("P", 5).await;
        let order = h.order(&[(p, 2)]).await;

        let cancelled = h
            .coordinator
            .cancel_order(order.order.id, None)
            .await
            .unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.order.payment_status, PaymentStatus::Pending);
        assert!(cancelled.order.notes.is_none());
        assert_eq!(h.stock(p).await, (5, 0));
    }

    #[tokio::test]
    async fn reason_is_appended_to_existing_notes() {
        let h = TestHarness::new();
        let p = h.product("P", 5).await;
        let customer = CustomerInfo {
            name: "N".to_string(),
            email: "n@example.com".to_string(),
            phone: "1".to_string(),
            address: "A".to_string(),
        };
        let order = h
            .coordinator
            .orders()
            .create_order(
                NewOrder::new(customer, PaymentMethod::Cash)
                    .item(p, 1, Money::from_cents(100))
                    .notes("gift wrap"),
            )
            .await
            .unwrap();

        let cancelled = h
            .coordinator
            .cancel_order(order.order.id, Some("changed mind".to_string()))
            .await
            .unwrap();
        assert_eq!(
            cancelled.order.notes.as_deref(),
            Some("gift wrap | Cancellation reason: changed mind")
        );
    }

    #[tokio::test]
    async fn terminal_orders_cannot_be_cancelled() {
        let h = TestHarness::new();
        let p = h.product("P", 5).await;

        let delivered = h.order(&[(p, 1)]).await;
        h.pay(delivered.order.id).await.unwrap();
        h.coordinator
            .update_status(delivered.order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        let err = h
            .coordinator
            .cancel_order(delivered.order.id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SagaError::Domain(DomainError::InvalidTransition { .. })
        ));
        assert_eq!(h.stock(p).await, (4, 1));

        let cancelled = h.order(&[(p, 1)]).await;
        h.coordinator.cancel_order(cancelled.order.id, None).await.unwrap();
        let err = h
            .coordinator
            .cancel_order(cancelled.order.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::Domain(DomainError::StateConflict(_))));
    }

    #[tokio::test]
    async fn update_status_cancelled_runs_compensation() {
        let h = TestHarness::new();
        let p = h.product("P", 5).await;
        let order = h.order(&[(p, 3)]).await;
        h.pay(order.order.id).await.unwrap();

        let cancelled = h
            .coordinator
            .update_status(order.order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.order.payment_status, PaymentStatus::Refunded);
        assert_eq!(h.stock(p).await, (5, 0));
    }

    #[tokio::test]
    async fn multi_line_round_trip() {
        let h = TestHarness::new();
        let a = h.product("A", 10).await;
        let b = h.product("B", 7).await;
        let order = h.order(&[(a, 4), (b, 7)]).await;

        h.pay(order.order.id).await.unwrap();
        assert_eq!(h.stock(a).await, (6, 4));
        assert_eq!(h.stock(b).await, (0, 7));

        h.coordinator
            .cancel_order(order.order.id, Some("out of area".to_string()))
            .await
            .unwrap();
        assert_eq!(h.stock(a).await, (10, 0));
        assert_eq!(h.stock(b).await, (7, 0));
    }
}
