//! Row shapes persisted and returned by the store.

use chrono::{DateTime, Utc};
use common::{
    Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, TransactionId,
    TransactionType, UserId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Customer contact snapshot copied onto an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// The order header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    pub order_number: String,
    #[serde(rename = "customerInfo")]
    pub customer: CustomerInfo,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// One order line as written at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRecord {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// Current catalogue view of a product, embedded in joined order reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A line item joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product: ProductSnapshot,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

/// An order header with all of its lines, read in one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderRecord,
    pub items: Vec<OrderLine>,
}

/// Stock-relevant product fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub stock: i64,
    pub low_stock_threshold: i64,
    pub total_sold: i64,
    pub selling_price: Money,
    pub buying_price: Money,
    pub images: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Creates an active product with no stock and a threshold of 5.
    pub fn new(name: impl Into<String>, selling_price: Money) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            slug: name.to_lowercase().replace(char::is_whitespace, "-"),
            name,
            stock: 0,
            low_stock_threshold: 5,
            total_sold: 0,
            selling_price,
            buying_price: Money::zero(),
            images: Vec::new(),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_buying_price(mut self, price: Money) -> Self {
        self.buying_price = price;
        self
    }

    pub fn with_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id,
            name: self.name.clone(),
            price: self.selling_price,
            images: self.images.clone(),
        }
    }
}

/// The two counters a stock movement touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCounts {
    pub stock: i64,
    pub total_sold: i64,
}

/// Payment details record linked from a ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub id: Uuid,
    pub method: PaymentMethod,
    pub amount_received: Option<Money>,
    pub received_by: String,
    pub notes: Option<String>,
}

/// A ledger entry. Refund entries carry a negative amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub transaction_number: String,
    pub order_id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub method: PaymentMethod,
    pub transaction_type: TransactionType,
    pub payment_status: PaymentStatus,
    pub amount: Money,
    /// The payment entry a refund reverses. `None` for payments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_of: Option<TransactionId>,
    pub details: TransactionDetails,
    pub reconciled: bool,
    pub reconciled_by: Option<UserId>,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockStats {
    pub total_products: i64,
    pub out_of_stock: i64,
    pub low_stock: i64,
    pub healthy_stock: i64,
    pub total_units: i64,
    pub average_units: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRevenue {
    pub method: PaymentMethod,
    pub revenue: Money,
}

/// Ledger overview. Revenue counts paid payment entries only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStats {
    pub total: i64,
    pub paid: i64,
    pub pending: i64,
    pub failed: i64,
    pub refunded: i64,
    pub reconciled: i64,
    pub total_revenue: Money,
    pub revenue_by_method: Vec<MethodRevenue>,
    pub total_refunds: Money,
    pub average_order_value: Money,
}
