//! Administrative stock operations and stock reports.

use common::ProductId;
use serde::{Deserialize, Serialize};
use store::{ProductRecord, StockQuery, StockStats, Store, StoreTx};

use crate::error::{DomainError, Result};
use crate::unit_of_work::abort;

/// Outcome of an absolute stock update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockChange {
    pub product_id: ProductId,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub change: i64,
}

/// Outcome of a restock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restock {
    pub product_id: ProductId,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub added: i64,
}

pub struct StockService<S: Store> {
    store: S,
}

impl<S: Store> StockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Sets a product's stock to an absolute value.
    #[tracing::instrument(skip(self))]
    pub async fn set_stock(&self, product_id: ProductId, new_stock: i64) -> Result<StockChange> {
        if new_stock < 0 {
            return Err(DomainError::Validation(
                "stock cannot be negative".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let (previous, _) = match overwrite(tx.as_mut(), product_id, |_| Ok(new_stock)).await {
            Ok(levels) => levels,
            Err(e) => {
                abort(tx, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        let change = new_stock - previous;
        metrics::counter!("stock_adjustments_total", "kind" => "set").increment(1);
        tracing::info!(%product_id, previous, new_stock, change, "stock set");
        Ok(StockChange {
            product_id,
            previous_stock: previous,
            new_stock,
            change,
        })
    }

    /// Adds a positive quantity to a product's stock.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, product_id: ProductId, quantity: i64) -> Result<Restock> {
        if quantity <= 0 {
            return Err(DomainError::Validation(
                "restock quantity must be positive".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let added = |current: i64| {
            current.checked_add(quantity).ok_or_else(|| {
                DomainError::Validation(format!(
                    "restock of {quantity} would overflow stock level {current}"
                ))
            })
        };
        let (previous, new_stock) = match overwrite(tx.as_mut(), product_id, added).await {
            Ok(levels) => levels,
            Err(e) => {
                abort(tx, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        metrics::counter!("stock_adjustments_total", "kind" => "restock").increment(1);
        metrics::counter!("stock_units_restocked_total").increment(quantity.unsigned_abs());
        tracing::info!(%product_id, previous, added = quantity, "product restocked");
        Ok(Restock {
            product_id,
            previous_stock: previous,
            new_stock,
            added: quantity,
        })
    }

    pub async fn list(&self, query: &StockQuery) -> Result<Vec<ProductRecord>> {
        Ok(self.store.list_stock(query).await?)
    }

    pub async fn stats(&self) -> Result<StockStats> {
        Ok(self.store.stock_stats().await?)
    }

    pub async fn low_stock(&self, limit: usize, offset: usize) -> Result<Vec<ProductRecord>> {
        self.list(&StockQuery::low_stock().limit(limit).offset(offset))
            .await
    }

    pub async fn out_of_stock(&self, limit: usize, offset: usize) -> Result<Vec<ProductRecord>> {
        self.list(&StockQuery::out_of_stock().limit(limit).offset(offset))
            .await
    }

    pub async fn top_sellers(&self, limit: usize) -> Result<Vec<ProductRecord>> {
        self.list(&StockQuery::top_sellers().limit(limit)).await
    }
}

/// Locks the product, writes `next(current)` and returns the previous and
/// new levels. Nothing is written when `next` fails.
async fn overwrite(
    tx: &mut dyn StoreTx,
    product_id: ProductId,
    next: impl FnOnce(i64) -> Result<i64> + Send,
) -> Result<(i64, i64)> {
    let counts = tx
        .lock_stock(product_id)
        .await?
        .ok_or_else(|| DomainError::not_found("product", product_id))?;
    let new_stock = next(counts.stock)?;
    tx.set_stock(product_id, new_stock).await?;
    Ok((counts.stock, new_stock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use store::InMemoryStore;

    async fn service_with(stock: i64) -> (StockService<InMemoryStore>, ProductId) {
        let store = InMemoryStore::new();
        let product = ProductRecord::new("Thermos", Money::from_cents(2_000)).with_stock(stock);
        let id = product.id;
        store.insert_product(product).await;
        (StockService::new(store), id)
    }

    #[tokio::test]
    async fn set_stock_reports_delta() {
        let (service, id) = service_with(10).await;
        let change = service.set_stock(id, 4).await.unwrap();
        assert_eq!(change.previous_stock, 10);
        assert_eq!(change.new_stock, 4);
        assert_eq!(change.change, -6);
    }

    #[tokio::test]
    async fn negative_stock_rejected_before_storage() {
        let (service, id) = service_with(10).await;
        let err = service.set_stock(id, -1).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn restock_adds() {
        let (service, id) = service_with(3).await;
        let restock = service.restock(id, 7).await.unwrap();
        assert_eq!(restock.new_stock, 10);
        assert_eq!(restock.added, 7);
        assert!(service.restock(id, 0).await.is_err());
    }

    #[tokio::test]
    async fn restock_past_i64_max_is_rejected() {
        let (service, id) = service_with(5).await;
        let err = service.restock(id, i64::MAX).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let unchanged = service.set_stock(id, 5).await.unwrap();
        assert_eq!(unchanged.previous_stock, 5);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (service, _) = service_with(1).await;
        let err = service.restock(ProductId::new(), 1).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "product", .. }));
    }

    #[tokio::test]
    async fn low_stock_report() {
        let (service, id) = service_with(2).await;
        let low = service.low_stock(20, 0).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, id);
        assert!(service.out_of_stock(20, 0).await.unwrap().is_empty());
    }
}
