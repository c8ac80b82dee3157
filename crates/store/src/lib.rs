//! Transactional storage port for the commerce core.
//!
//! The [`Store`] trait exposes read queries and opens [`StoreTx`] units of
//! work. Every multi-row mutation (order + items, N stock rows, ledger entry +
//! details) runs inside one `StoreTx`, which is committed explicitly and rolled
//! back on every other path, including being dropped mid-flight.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{
    DEFAULT_LIMIT, MAX_LIMIT, OrderQuery, StockFilter, StockOrder, StockQuery, TransactionQuery,
};
pub use record::{
    CustomerInfo, LineItemRecord, MethodRevenue, OrderDetails, OrderLine, OrderRecord,
    ProductRecord, ProductSnapshot, StockCounts, StockStats, TransactionDetails,
    TransactionRecord, TransactionStats,
};
pub use store::{Store, StoreTx};
