use crate::error::Result;
use crate::query::{OrderQuery, StockQuery, TransactionQuery};
use crate::record::{
    LineItemRecord, OrderDetails, OrderRecord, ProductRecord, StockCounts, StockStats,
    TransactionRecord, TransactionStats,
};
use async_trait::async_trait;
use common::{Money, OrderId, ProductId, TransactionId};

/// Storage port. Reads run outside any unit of work; writes go through
/// [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a unit of work. Dropping the returned handle without calling
    /// [`StoreTx::commit`] discards every write made through it.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// Reads an order with its lines and product snapshots in one statement.
    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>>;

    async fn list_orders(&self, query: &OrderQuery) -> Result<Vec<OrderDetails>>;

    async fn product(&self, id: ProductId) -> Result<Option<ProductRecord>>;

    async fn list_stock(&self, query: &StockQuery) -> Result<Vec<ProductRecord>>;

    async fn stock_stats(&self) -> Result<StockStats>;

    async fn transaction(&self, id: TransactionId) -> Result<Option<TransactionRecord>>;

    async fn transactions_for_order(&self, order_id: OrderId) -> Result<Vec<TransactionRecord>>;

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<TransactionRecord>>;

    async fn transaction_stats(&self) -> Result<TransactionStats>;
}

/// A single storage transaction.
#[async_trait]
pub trait StoreTx: Send {
    async fn insert_order(&mut self, order: &OrderRecord) -> Result<()>;

    /// Fails with `MissingReference` if the product does not exist.
    async fn insert_line_item(&mut self, order_id: OrderId, item: &LineItemRecord) -> Result<()>;

    /// Reads the order header and locks it until the transaction ends.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Writes the mutable header fields: statuses, notes, delivered_at, updated_at.
    async fn update_order(&mut self, order: &OrderRecord) -> Result<()>;

    async fn line_items(&mut self, order_id: OrderId) -> Result<Vec<LineItemRecord>>;

    /// Reads and locks a product's counters.
    async fn lock_stock(&mut self, product_id: ProductId) -> Result<Option<StockCounts>>;

    /// `stock -= quantity, total_sold += quantity` guarded by `stock >= quantity`.
    /// Returns false when no row matched the guard.
    async fn decrement_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool>;

    /// `stock += quantity, total_sold = max(total_sold - quantity, 0)`.
    /// Returns false when the product does not exist.
    async fn restore_stock(&mut self, product_id: ProductId, quantity: u32) -> Result<bool>;

    async fn set_stock(&mut self, product_id: ProductId, stock: i64) -> Result<()>;

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<()>;

    /// Reads and locks a ledger entry.
    async fn lock_transaction(&mut self, id: TransactionId) -> Result<Option<TransactionRecord>>;

    /// Writes the reconciliation fields and the details notes.
    async fn update_reconciliation(&mut self, record: &TransactionRecord) -> Result<()>;

    /// Sum of refunds already booked against one payment entry, as a
    /// positive amount.
    async fn refunded_total(&mut self, original: TransactionId) -> Result<Money>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
