use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, PaymentStatus, ProductId, TransactionId, TransactionType};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    LineItemRecord, MethodRevenue, OrderDetails, OrderLine, OrderQuery, OrderRecord,
    ProductRecord, Result, StockCounts, StockOrder, StockQuery, StockStats, StoreError,
    TransactionQuery, TransactionRecord, TransactionStats,
    store::{Store, StoreTx},
};

#[derive(Clone, Default)]
struct Tables {
    orders: HashMap<OrderId, OrderRecord>,
    items: HashMap<OrderId, Vec<LineItemRecord>>,
    products: HashMap<ProductId, ProductRecord>,
    transactions: Vec<TransactionRecord>,
}

impl Tables {
    fn details(&self, order: &OrderRecord) -> OrderDetails {
        let items = self
            .items
            .get(&order.id)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|item| {
                        let product = self.products.get(&item.product_id)?;
                        Some(OrderLine {
                            product: product.snapshot(),
                            unit_price: item.unit_price,
                            quantity: item.quantity,
                            subtotal: item.subtotal,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        OrderDetails {
            order: order.clone(),
            items,
        }
    }

    fn product_mut(&mut self, id: ProductId) -> Option<&mut ProductRecord> {
        self.products.get_mut(&id)
    }
}

/// In-memory store for tests and database-less runs.
///
/// A unit of work holds the table lock for its whole lifetime and mutates a
/// private copy, so transactions are fully serialized and a dropped
/// transaction leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing_commits: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a catalogue product.
    pub async fn insert_product(&self, product: ProductRecord) {
        self.tables
            .lock()
            .await
            .products
            .insert(product.id, product);
    }

    /// Makes the next `count` commits fail with a retryable conflict.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    pub async fn order_count(&self) -> usize {
        self.tables.lock().await.orders.len()
    }

    pub async fn transaction_count(&self) -> usize {
        self.tables.lock().await.transactions.len()
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn page<T>(rows: Vec<T>, limit: usize, offset: usize) -> Vec<T> {
    rows.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard,
            working,
            store: self.clone(),
        }))
    }

    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>> {
        let tables = self.tables.lock().await;
        Ok(tables.orders.get(&id).map(|order| tables.details(order)))
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderDetails>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .filter(|o| {
                query
                    .customer_email
                    .as_ref()
                    .is_none_or(|email| o.customer.email.eq_ignore_ascii_case(email))
            })
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        let orders = orders.into_iter().map(|o| tables.details(o)).collect();
        Ok(page(orders, query.limit, query.offset))
    }

    async fn product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn list_stock(&self, query: &StockQuery) -> Result<Vec<ProductRecord>> {
        let tables = self.tables.lock().await;
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| p.status != "deleted")
            .filter(|p| {
                needle
                    .as_ref()
                    .is_none_or(|n| p.name.to_lowercase().contains(n))
            })
            .filter(|p| {
                query
                    .filter
                    .is_none_or(|f| f.matches(p.stock, p.low_stock_threshold, p.total_sold))
            })
            .cloned()
            .collect();
        match query.order {
            StockOrder::Name => products.sort_by(|a, b| a.name.cmp(&b.name)),
            StockOrder::StockAscending => products.sort_by_key(|p| p.stock),
            StockOrder::RecentlyUpdated => products.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
            StockOrder::TopSelling => products.sort_by(|a, b| b.total_sold.cmp(&a.total_sold)),
        }
        Ok(page(products, query.limit, query.offset))
    }

    async fn stock_stats(&self) -> Result<StockStats> {
        let tables = self.tables.lock().await;
        let mut stats = StockStats::default();
        for p in tables.products.values().filter(|p| p.status != "deleted") {
            stats.total_products += 1;
            stats.total_units += p.stock;
            if p.stock == 0 {
                stats.out_of_stock += 1;
            } else if p.stock <= p.low_stock_threshold {
                stats.low_stock += 1;
            } else {
                stats.healthy_stock += 1;
            }
        }
        if stats.total_products > 0 {
            stats.average_units = stats.total_units as f64 / stats.total_products as f64;
        }
        Ok(stats)
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn transactions_for_order(&self, order_id: OrderId) -> Result<Vec<TransactionRecord>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<_> = tables
            .transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<TransactionRecord>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<_> = tables
            .transactions
            .iter()
            .filter(|t| query.status.is_none_or(|s| t.payment_status == s))
            .filter(|t| query.transaction_type.is_none_or(|k| t.transaction_type == k))
            .filter(|t| query.method.is_none_or(|m| t.method == m))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(rows, query.limit, query.offset))
    }

    async fn transaction_stats(&self) -> Result<TransactionStats> {
        let tables = self.tables.lock().await;
        let mut stats = TransactionStats::default();
        let mut by_method: Vec<MethodRevenue> = Vec::new();
        let mut paid_payments = 0i64;

        for t in &tables.transactions {
            stats.total += 1;
            match t.payment_status {
                PaymentStatus::Paid => stats.paid += 1,
                PaymentStatus::Pending => stats.pending += 1,
                PaymentStatus::Failed => stats.failed += 1,
                PaymentStatus::Refunded => stats.refunded += 1,
            }
            if t.reconciled {
                stats.reconciled += 1;
            }
            match t.transaction_type {
                TransactionType::OrderPayment if t.payment_status == PaymentStatus::Paid => {
                    paid_payments += 1;
                    stats.total_revenue += t.amount;
                    match by_method.iter_mut().find(|m| m.method == t.method) {
                        Some(entry) => entry.revenue += t.amount,
                        None => by_method.push(MethodRevenue {
                            method: t.method,
                            revenue: t.amount,
                        }),
                    }
                }
                TransactionType::OrderRefund => stats.total_refunds += t.amount.abs(),
                _ => {}
            }
        }

        by_method.sort_by_key(|m| m.method.as_str());
        stats.revenue_by_method = by_method;
        if paid_payments > 0 {
            stats.average_order_value = Money::from_cents(stats.total_revenue.cents() / paid_payments);
        }
        Ok(stats)
    }
}

/// Unit of work over a private copy of the tables.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    store: InMemoryStore,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()> {
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert_line_item(&mut self, order_id: OrderId, item: &LineItemRecord) -> Result<()> {
        if !self.working.orders.contains_key(&order_id) {
            return Err(StoreError::MissingReference {
                entity: "order",
                detail: order_id.to_string(),
            });
        }
        if !self.working.products.contains_key(&item.product_id) {
            return Err(StoreError::MissingReference {
                entity: "product",
                detail: item.product_id.to_string(),
            });
        }
        if item.quantity == 0 {
            return Err(StoreError::ConstraintViolation(
                "order_items_quantity_check".to_string(),
            ));
        }
        self.working
            .items
            .entry(order_id)
            .or_default()
            .push(item.clone());
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<()> {
        if let Some(existing) = self.working.orders.get_mut(&order.id) {
            existing.status = order.status;
            existing.payment_status = order.payment_status;
            existing.notes = order.notes.clone();
            existing.delivered_at = order.delivered_at;
            existing.updated_at = order.updated_at;
        }
        Ok(())
    }

    async fn line_items(&mut self, order_id: OrderId) -> Result<Vec<LineItemRecord>> {
        Ok(self
            .working
            .items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockCounts>> {
        Ok(self.working.products.get(&product_id).map(|p| StockCounts {
            stock: p.stock,
            total_sold: p.total_sold,
        }))
    }

    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let quantity = i64::from(quantity);
        match self.working.product_mut(product_id) {
            Some(p) if p.stock >= quantity => {
                p.stock -= quantity;
                p.total_sold += quantity;
                p.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let quantity = i64::from(quantity);
        match self.working.product_mut(product_id) {
            Some(p) => {
                p.stock += quantity;
                p.total_sold = (p.total_sold - quantity).max(0);
                p.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_stock(&mut self, product_id: ProductId, stock: i64) -> Result<()> {
        if stock < 0 {
            return Err(StoreError::ConstraintViolation(
                "products_stock_check".to_string(),
            ));
        }
        if let Some(p) = self.working.product_mut(product_id) {
            p.stock = stock;
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        if !self.working.orders.contains_key(&record.order_id) {
            return Err(StoreError::MissingReference {
                entity: "order",
                detail: record.order_id.to_string(),
            });
        }
        self.working.transactions.push(record.clone());
        Ok(())
    }

    async fn lock_transaction(&mut self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        Ok(self
            .working
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn update_reconciliation(&mut self, record: &TransactionRecord) -> Result<()> {
        if let Some(existing) = self
            .working
            .transactions
            .iter_mut()
            .find(|t| t.id == record.id)
        {
            existing.reconciled = record.reconciled;
            existing.reconciled_by = record.reconciled_by;
            existing.reconciled_at = record.reconciled_at;
            existing.payment_status = record.payment_status;
            existing.details.notes = record.details.notes.clone();
            existing.updated_at = record.updated_at;
        }
        Ok(())
    }

    async fn refunded_total(&mut self, original: TransactionId) -> Result<Money> {
        Ok(self
            .working
            .transactions
            .iter()
            .filter(|t| {
                t.refund_of == Some(original) && t.transaction_type == TransactionType::OrderRefund
            })
            .map(|t| t.amount.abs())
            .sum())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx {
            mut guard,
            working,
            store,
        } = *self;
        if store.take_injected_failure() {
            return Err(StoreError::Conflict(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
