//! Integration tests for the order, stock and ledger services against the
//! in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{Money, OrderStatus, PaymentMethod, PaymentStatus, ProductId, TransactionType, UserId};
use domain::{
    DomainError, LedgerService, NewOrder, NewPayment, Notifier, NotifyError, OrderError,
    OrderService, StockService, TransitionPolicy,
};
use store::{CustomerInfo, InMemoryStore, OrderDetails, ProductRecord, Store, TransactionQuery};

fn customer(email: &str) -> CustomerInfo {
    CustomerInfo {
        name: "Amina Hassan".to_string(),
        email: email.to_string(),
        phone: "0733000000".to_string(),
        address: "Nyali, Mombasa".to_string(),
    }
}

async fn seeded_store() -> (InMemoryStore, ProductId, ProductId) {
    let store = InMemoryStore::new();
    let kettle = ProductRecord::new("Kettle", Money::from_cents(2_500)).with_stock(10);
    let cup = ProductRecord::new("Cup", Money::from_cents(300)).with_stock(40);
    let (k, c) = (kettle.id, cup.id);
    store.insert_product(kettle).await;
    store.insert_product(cup).await;
    (store, k, c)
}

fn assert_send<T: Send>(_: &T) {}

/// HTTP handlers spawn these on a multi-threaded runtime.
#[test]
fn mutating_futures_are_send() {
    let store = InMemoryStore::new();
    let orders = OrderService::new(store.clone());
    let ledger = LedgerService::new(store.clone());
    let stock = StockService::new(store);
    let order_id = common::OrderId::new();
    let entry = common::TransactionId::new();

    assert_send(&orders.create_order(NewOrder::new(customer("a@b.test"), PaymentMethod::Cash)));
    assert_send(&orders.update_status(order_id, OrderStatus::Shipped));
    assert_send(&ledger.record_payment(NewPayment::new(
        order_id,
        PaymentMethod::Cash,
        Money::from_cents(1),
        "desk",
    )));
    assert_send(&ledger.reconcile(entry, UserId::new(), None));
    assert_send(&ledger.refund(entry, Money::from_cents(1), UserId::new(), "r"));
    assert_send(&stock.set_stock(ProductId::new(), 1));
    assert_send(&stock.restock(ProductId::new(), 1));
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn creates_order_with_recomputed_total() {
        let (store, kettle, cup) = seeded_store().await;
        let service = OrderService::new(store);

        let order = service
            .create_order(
                NewOrder::new(customer("amina@example.com"), PaymentMethod::Mpesa)
                    .item(kettle, 1, Money::from_cents(2_500))
                    .item(cup, 4, Money::from_cents(300))
                    .notes("call on arrival"),
            )
            .await
            .unwrap();

        assert_eq!(order.order.total_amount, Money::from_cents(3_700));
        assert_eq!(order.order.status, OrderStatus::Placed);
        assert_eq!(order.order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[1].subtotal, Money::from_cents(1_200));
        assert!(order.order.order_number.starts_with("ORD-"));
    }

    #[tokio::test]
    async fn unknown_product_rolls_back_everything() {
        let (store, kettle, _) = seeded_store().await;
        let service = OrderService::new(store.clone());

        let err = service
            .create_order(
                NewOrder::new(customer("amina@example.com"), PaymentMethod::Cash)
                    .item(kettle, 1, Money::from_cents(2_500))
                    .item(ProductId::new(), 1, Money::from_cents(100)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { entity: "product", .. }));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_storage() {
        let (store, _, _) = seeded_store().await;
        let service = OrderService::new(store.clone());

        let err = service
            .create_order(NewOrder::new(customer("amina@example.com"), PaymentMethod::Cash))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Order(OrderError::NoItems)));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn orders_for_customer_filters_by_email() {
        let (store, kettle, _) = seeded_store().await;
        let service = OrderService::new(store);
        for email in ["a@example.com", "b@example.com", "a@example.com"] {
            service
                .create_order(
                    NewOrder::new(customer(email), PaymentMethod::Card)
                        .item(kettle, 1, Money::from_cents(2_500)),
                )
                .await
                .unwrap();
        }

        assert_eq!(service.orders_for_customer("a@example.com").await.unwrap().len(), 2);
        assert!(service.orders_for_customer("  ").await.is_err());
    }
}

mod status {
    use super::*;

    async fn placed_order(service: &OrderService<InMemoryStore>, product: ProductId) -> OrderDetails {
        service
            .create_order(
                NewOrder::new(customer("amina@example.com"), PaymentMethod::Mpesa)
                    .item(product, 1, Money::from_cents(2_500)),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn permissive_policy_allows_jump_to_delivered() {
        let (store, kettle, _) = seeded_store().await;
        let service = OrderService::new(store);
        let order = placed_order(&service, kettle).await;

        let delivered = service
            .update_status(order.order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(delivered.order.status, OrderStatus::Delivered);
        assert!(delivered.order.delivered_at.is_some());
    }

    #[tokio::test]
    async fn strict_policy_rejects_jump() {
        let (store, kettle, _) = seeded_store().await;
        let service = OrderService::new(store).with_policy(TransitionPolicy::Strict);
        let order = placed_order(&service, kettle).await;

        let err = service
            .update_status(order.order.id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        let unchanged = service.require(order.order.id).await.unwrap();
        assert_eq!(unchanged.order.status, OrderStatus::Placed);
    }

    #[tokio::test]
    async fn terminal_state_rejects_further_transitions() {
        let (store, kettle, _) = seeded_store().await;
        let service = OrderService::new(store);
        let order = placed_order(&service, kettle).await;
        service
            .update_status(order.order.id, OrderStatus::Completed)
            .await
            .unwrap();

        let err = service
            .update_status(order.order.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (store, _, _) = seeded_store().await;
        let service = OrderService::new(store);
        let err = service
            .update_status(common::OrderId::new(), OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "order", .. }));
    }

    struct FailingNotifier(AtomicUsize);

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn order_placed(&self, _: &OrderDetails) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError("smtp unreachable".to_string()))
        }

        async fn status_changed(&self, _: &OrderDetails, _: OrderStatus) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError("smtp unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn notification_failures_are_swallowed() {
        let (store, kettle, _) = seeded_store().await;
        let notifier = Arc::new(FailingNotifier(AtomicUsize::new(0)));
        let service = OrderService::new(store).with_notifier(notifier.clone());

        let order = placed_order(&service, kettle).await;
        service
            .update_status(order.order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(notifier.0.load(Ordering::SeqCst), 2);
    }
}

mod ledger {
    use super::*;

    async fn paid_entry(
        store: &InMemoryStore,
        kettle: ProductId,
        amount: i64,
    ) -> store::TransactionRecord {
        let orders = OrderService::new(store.clone());
        let order = orders
            .create_order(
                NewOrder::new(customer("amina@example.com"), PaymentMethod::Mpesa)
                    .item(kettle, 1, Money::from_cents(amount)),
            )
            .await
            .unwrap();
        LedgerService::new(store.clone())
            .record_payment(NewPayment::new(
                order.order.id,
                PaymentMethod::Mpesa,
                Money::from_cents(amount),
                "front desk",
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn payment_copies_order_snapshot() {
        let (store, kettle, _) = seeded_store().await;
        let entry = paid_entry(&store, kettle, 2_500).await;
        assert_eq!(entry.customer_email, "amina@example.com");
        assert_eq!(entry.payment_status, PaymentStatus::Paid);
        assert!(entry.transaction_number.starts_with("TXN-"));
        assert!(!entry.reconciled);
    }

    #[tokio::test]
    async fn payment_for_unknown_order_is_rejected() {
        let (store, _, _) = seeded_store().await;
        let ledger = LedgerService::new(store.clone());
        let err = ledger
            .record_payment(NewPayment::new(
                common::OrderId::new(),
                PaymentMethod::Cash,
                Money::from_cents(100),
                "desk",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "order", .. }));
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn reconcile_is_one_way() {
        let (store, kettle, _) = seeded_store().await;
        let entry = paid_entry(&store, kettle, 2_500).await;
        let ledger = LedgerService::new(store);
        let admin = UserId::new();

        let reconciled = ledger
            .reconcile(entry.id, admin, Some("matched M-Pesa statement".to_string()))
            .await
            .unwrap();
        assert!(reconciled.reconciled);
        assert_eq!(reconciled.reconciled_by, Some(admin));
        assert_eq!(
            reconciled.details.notes.as_deref(),
            Some("Reconciliation: matched M-Pesa statement")
        );

        let err = ledger.reconcile(entry.id, admin, None).await.unwrap_err();
        assert!(matches!(err, DomainError::StateConflict(_)));
    }

    #[tokio::test]
    async fn refunds_are_negative_and_bounded() {
        let (store, kettle, _) = seeded_store().await;
        let entry = paid_entry(&store, kettle, 2_500).await;
        let ledger = LedgerService::new(store);
        let admin = UserId::new();

        let refund = ledger
            .refund(entry.id, Money::from_cents(1_000), admin, "damaged lid")
            .await
            .unwrap();
        assert_eq!(refund.amount, Money::from_cents(-1_000));
        assert_eq!(refund.transaction_type, TransactionType::OrderRefund);
        assert!(refund.reconciled);
        assert!(refund.transaction_number.starts_with("REF-"));
        assert_eq!(
            refund.details.notes.as_deref(),
            Some(format!("Refund for transaction {}. Reason: damaged lid", entry.transaction_number).as_str())
        );

        let err = ledger
            .refund(entry.id, Money::from_cents(1_501), admin, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        ledger
            .refund(entry.id, Money::from_cents(1_500), admin, "rest")
            .await
            .unwrap();

        let refunds = ledger
            .list(&TransactionQuery::new().transaction_type(TransactionType::OrderRefund))
            .await
            .unwrap();
        assert_eq!(refunds.len(), 2);
    }

    #[tokio::test]
    async fn each_payment_has_its_own_refund_cap() {
        let (store, kettle, _) = seeded_store().await;
        let first = paid_entry(&store, kettle, 1_500).await;
        let second = LedgerService::new(store.clone())
            .record_payment(NewPayment::new(
                first.order_id,
                PaymentMethod::Cash,
                Money::from_cents(1_500),
                "front desk",
            ))
            .await
            .unwrap();
        let ledger = LedgerService::new(store);
        let admin = UserId::new();

        ledger
            .refund(first.id, Money::from_cents(1_500), admin, "returned")
            .await
            .unwrap();
        let refund = ledger
            .refund(second.id, Money::from_cents(1_500), admin, "returned")
            .await
            .unwrap();
        assert_eq!(refund.refund_of, Some(second.id));

        let err = ledger
            .refund(first.id, Money::from_cents(1), admin, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn refund_of_refund_is_rejected() {
        let (store, kettle, _) = seeded_store().await;
        let entry = paid_entry(&store, kettle, 2_500).await;
        let ledger = LedgerService::new(store);
        let refund = ledger
            .refund(entry.id, Money::from_cents(100), UserId::new(), "scratch")
            .await
            .unwrap();

        let err = ledger
            .refund(refund.id, Money::from_cents(1), UserId::new(), "loop")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StateConflict(_)));
    }

    #[tokio::test]
    async fn stats_summarise_revenue_and_refunds() {
        let (store, kettle, _) = seeded_store().await;
        let first = paid_entry(&store, kettle, 2_000).await;
        paid_entry(&store, kettle, 4_000).await;
        let ledger = LedgerService::new(store.clone());
        ledger
            .refund(first.id, Money::from_cents(500), UserId::new(), "late")
            .await
            .unwrap();

        let stats = ledger.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_revenue, Money::from_cents(6_000));
        assert_eq!(stats.total_refunds, Money::from_cents(500));
        assert_eq!(stats.average_order_value, Money::from_cents(3_000));
        assert_eq!(stats.reconciled, 1);
        assert_eq!(ledger.for_order(first.order_id).await.unwrap().len(), 2);
        assert!(store.transaction(first.id).await.unwrap().is_some());
    }
}
