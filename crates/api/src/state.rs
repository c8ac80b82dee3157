//! Shared application state.

use domain::{LedgerService, OrderService, StockService, TransitionPolicy};
use saga::{ReconciliationCoordinator, RetryPolicy};
use store::Store;

/// Services constructed once at startup and shared by all handlers.
pub struct AppState<S: Store> {
    pub coordinator: ReconciliationCoordinator<S>,
    pub ledger: LedgerService<S>,
    pub stock: StockService<S>,
}

impl<S: Store + Clone> AppState<S> {
    pub fn new(store: S, policy: TransitionPolicy, retry: RetryPolicy) -> Self {
        let orders = OrderService::new(store.clone()).with_policy(policy);
        Self {
            coordinator: ReconciliationCoordinator::new(orders).with_retry(retry),
            ledger: LedgerService::new(store.clone()),
            stock: StockService::new(store),
        }
    }
}

impl<S: Store> AppState<S> {
    pub fn orders(&self) -> &OrderService<S> {
        self.coordinator.orders()
    }
}
