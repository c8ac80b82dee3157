use common::{OrderStatus, PaymentMethod, PaymentStatus, TransactionType};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIMIT)
}

/// Filter and pagination for order listings, newest first.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub customer_email: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            status: None,
            customer_email: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl OrderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for all orders placed with the given email.
    pub fn for_customer(email: impl Into<String>) -> Self {
        Self {
            customer_email: Some(email.into()),
            limit: MAX_LIMIT,
            ..Default::default()
        }
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = clamp_limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Stock level bucket, relative to each product's low-stock threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockFilter {
    /// `stock > low_stock_threshold`
    InStock,
    /// `0 < stock <= low_stock_threshold`
    LowStock,
    /// `stock = 0`
    OutOfStock,
    /// `total_sold > 0`
    Selling,
}

impl StockFilter {
    /// Parses the wire form used by the stock listing endpoint.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in-stock" => Some(StockFilter::InStock),
            "low-stock" => Some(StockFilter::LowStock),
            "out-of-stock" => Some(StockFilter::OutOfStock),
            _ => None,
        }
    }

    /// Returns true if a product with these counters falls in the bucket.
    pub fn matches(&self, stock: i64, threshold: i64, total_sold: i64) -> bool {
        match self {
            StockFilter::InStock => stock > threshold,
            StockFilter::LowStock => stock > 0 && stock <= threshold,
            StockFilter::OutOfStock => stock == 0,
            StockFilter::Selling => total_sold > 0,
        }
    }
}

/// Sort order for stock listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockOrder {
    #[default]
    Name,
    StockAscending,
    RecentlyUpdated,
    TopSelling,
}

/// Filter, sort and pagination for product stock listings.
#[derive(Debug, Clone)]
pub struct StockQuery {
    /// Case-insensitive substring match on the product name.
    pub search: Option<String>,
    pub filter: Option<StockFilter>,
    pub order: StockOrder,
    pub limit: usize,
    pub offset: usize,
}

impl Default for StockQuery {
    fn default() -> Self {
        Self {
            search: None,
            filter: None,
            order: StockOrder::Name,
            limit: 50,
            offset: 0,
        }
    }
}

impl StockQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Products at or below their low-stock threshold but not empty, emptiest first.
    pub fn low_stock() -> Self {
        Self {
            filter: Some(StockFilter::LowStock),
            order: StockOrder::StockAscending,
            limit: DEFAULT_LIMIT,
            ..Default::default()
        }
    }

    /// Products with no stock, most recently updated first.
    pub fn out_of_stock() -> Self {
        Self {
            filter: Some(StockFilter::OutOfStock),
            order: StockOrder::RecentlyUpdated,
            limit: DEFAULT_LIMIT,
            ..Default::default()
        }
    }

    /// Products that have sold at least once, best sellers first.
    pub fn top_sellers() -> Self {
        Self {
            filter: Some(StockFilter::Selling),
            order: StockOrder::TopSelling,
            limit: 10,
            ..Default::default()
        }
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then_some(search);
        self
    }

    pub fn filter(mut self, filter: StockFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = clamp_limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Filter and pagination for ledger listings, newest first.
#[derive(Debug, Clone)]
pub struct TransactionQuery {
    pub status: Option<PaymentStatus>,
    pub transaction_type: Option<TransactionType>,
    pub method: Option<PaymentMethod>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            status: None,
            transaction_type: None,
            method: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl TransactionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn method(mut self, method: PaymentMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = clamp_limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
