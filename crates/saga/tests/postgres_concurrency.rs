//! Payment reconciliation against PostgreSQL under real concurrency.
//!
//! Each unit of work runs on its own pooled connection, so the guarded
//! decrement and the deadlock retry path are exercised for real.
//!
//! ```bash
//! cargo test -p saga --test postgres_concurrency -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{Money, OrderId, PaymentMethod, PaymentStatus, ProductId};
use domain::{DomainError, NewOrder, OrderService};
use saga::{ReconciliationCoordinator, RetryPolicy, SagaError};
use sqlx::PgPool;
use store::{CustomerInfo, PostgresStore, ProductRecord, Store};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_commerce_tables.sql"
            ))
            .execute(&pool)
            .await
            .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

struct PgHarness {
    store: PostgresStore,
    coordinator: Arc<ReconciliationCoordinator<PostgresStore>>,
}

impl PgHarness {
    async fn new() -> Self {
        let info = get_container_info().await;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(12)
            .connect(&info.connection_string)
            .await
            .unwrap();
        sqlx::query(
            "TRUNCATE TABLE transactions, transaction_details, order_items, orders, products CASCADE",
        )
        .execute(&pool)
        .await
        .unwrap();

        let store = PostgresStore::new(pool);
        let coordinator = ReconciliationCoordinator::new(OrderService::new(store.clone()))
            .with_retry(RetryPolicy::new(8, Duration::from_millis(5)));
        Self {
            store,
            coordinator: Arc::new(coordinator),
        }
    }

    async fn product(&self, name: &str, stock: i64) -> ProductId {
        let product = ProductRecord::new(name, Money::from_cents(100)).with_stock(stock);
        self.store.insert_product(&product).await.unwrap();
        product.id
    }

    async fn stock(&self, id: ProductId) -> (i64, i64) {
        let p = self.store.product(id).await.unwrap().unwrap();
        (p.stock, p.total_sold)
    }

    async fn order(&self, lines: &[(ProductId, i64)]) -> OrderId {
        let customer = CustomerInfo {
            name: "Nyambura Kamau".to_string(),
            email: "nyambura@example.com".to_string(),
            phone: "0722000000".to_string(),
            address: "Nakuru".to_string(),
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
            .order
            .id
    }

    async fn pay_all(&self, orders: Vec<OrderId>) -> Vec<saga::Result<()>> {
        let handles: Vec<_> = orders
            .into_iter()
            .map(|id| {
                let coordinator = Arc::clone(&self.coordinator);
                tokio::spawn(async move {
                    coordinator
                        .update_payment_status(id, PaymentStatus::Paid)
                        .await
                        .map(|_| ())
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payments_never_oversell() {
    let h = PgHarness::new().await;
    let p = h.product("Hot item", 5).await;
    let mut orders = Vec::new();
    for _ in 0..10 {
        orders.push(h.order(&[(p, 1)]).await);
    }

    let results = h.pay_all(orders).await;

    let mut succeeded = 0;
    for result in results {
        match result {
            Ok(()) => succeeded += 1,
            Err(e) => assert!(
                matches!(e, SagaError::Domain(DomainError::InsufficientStock { .. })),
                "unexpected error: {e}"
            ),
        }
    }
    assert_eq!(succeeded, 5);
    assert_eq!(h.stock(p).await, (0, 5));

    let paid = h
        .store
        .list_orders(&store::OrderQuery::new())
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.order.payment_status == PaymentStatus::Paid)
        .count();
    assert_eq!(paid, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_lock_orders_both_commit() {
    let h = PgHarness::new().await;
    let a = h.product("A", 20).await;
    let b = h.product("B", 20).await;

    let mut orders = Vec::new();
    for _ in 0..4 {
        orders.push(h.order(&[(a, 1), (b, 1)]).await);
        orders.push(h.order(&[(b, 1), (a, 1)]).await);
    }

    // Deadlocks between the two line orders surface as retryable conflicts.
    let results = h.pay_all(orders).await;
    for result in results {
        result.unwrap();
    }

    assert_eq!(h.stock(a).await, (12, 8));
    assert_eq!(h.stock(b).await, (12, 8));
}
