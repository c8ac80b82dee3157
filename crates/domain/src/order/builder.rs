//! Checkout validation and order construction.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId};
use serde::{Deserialize, Serialize};
use store::{CustomerInfo, LineItemRecord, OrderRecord};
use uuid::Uuid;

use super::OrderError;

/// A requested order line. The unit price is taken as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewOrderItem {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
        }
    }
}

/// Checkout input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub items: Vec<NewOrderItem>,
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn new(customer: CustomerInfo, payment_method: PaymentMethod) -> Self {
        Self {
            customer,
            payment_method,
            items: Vec::new(),
            notes: None,
        }
    }

    pub fn item(mut self, product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        self.items.push(NewOrderItem::new(product_id, quantity, unit_price));
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the checkout input without building anything.
    pub fn validate(&self) -> Result<(), OrderError> {
        let c = &self.customer;
        for (field, value) in [
            ("name", &c.name),
            ("email", &c.email),
            ("phone", &c.phone),
            ("address", &c.address),
        ] {
            if value.trim().is_empty() {
                return Err(OrderError::CustomerFieldRequired { field });
            }
        }
        if self.items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &self.items {
            if item.quantity <= 0 || item.quantity > i64::from(u32::MAX) {
                return Err(OrderError::InvalidQuantity {
                    quantity: item.quantity,
                });
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    price: item.unit_price.cents(),
                });
            }
        }
        Ok(())
    }

    /// Validates and builds the header and line rows. Subtotals and the
    /// total are always recomputed here.
    pub fn build(
        self,
        now: DateTime<Utc>,
    ) -> Result<(OrderRecord, Vec<LineItemRecord>), OrderError> {
        self.validate()?;

        let mut total = Money::zero();
        let mut lines = Vec::with_capacity(self.items.len());
        for item in &self.items {
            // Range checked in validate().
            let quantity = item.quantity as u32;
            let subtotal = item
                .unit_price
                .checked_mul(quantity)
                .ok_or(OrderError::TotalOverflow)?;
            total = total
                .checked_add(subtotal)
                .ok_or(OrderError::TotalOverflow)?;
            lines.push(LineItemRecord {
                product_id: item.product_id,
                quantity,
                unit_price: item.unit_price,
                subtotal,
            });
        }

        let customer = CustomerInfo {
            name: self.customer.name.trim().to_string(),
            email: self.customer.email.trim().to_string(),
            phone: self.customer.phone.trim().to_string(),
            address: self.customer.address.trim().to_string(),
        };

        let order = OrderRecord {
            id: OrderId::new(),
            order_number: generate_order_number(now),
            customer,
            status: OrderStatus::Placed,
            payment_status: PaymentStatus::Pending,
            payment_method: self.payment_method,
            total_amount: total,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            placed_at: now,
            delivered_at: None,
            updated_at: now,
        };
        Ok((order, lines))
    }
}

/// `ORD-YYYYMMDD-NNNN` with four random digits. Not guaranteed unique.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().as_u128() % 10_000;
    format!("ORD-{}-{suffix:04}", now.format("%Y%m%d"))
}
