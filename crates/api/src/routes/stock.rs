//! Stock administration and stock reports. All require an admin.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use domain::{Restock, StockChange};
use serde::Deserialize;
use store::{DEFAULT_LIMIT, ProductRecord, StockFilter, StockQuery, StockStats, Store};

use crate::auth::AdminPrincipal;
use crate::error::{ApiError, Envelope};
use crate::extract::{ApiJson, ApiQuery, parse_id};
use crate::state::AppState;

type ProductsResponse = Result<Json<Envelope<Vec<ProductRecord>>>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct ListStockParams {
    pub search: Option<String>,
    /// `in-stock`, `low-stock` or `out-of-stock`.
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStockRequest {
    pub new_stock: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: i64,
    pub reason: Option<String>,
}

/// GET /stock
#[tracing::instrument(skip(state, _admin))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    ApiQuery(params): ApiQuery<ListStockParams>,
) -> ProductsResponse {
    let mut query = StockQuery::new();
    if let Some(search) = params.search {
        query = query.search(search);
    }
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        let filter = StockFilter::parse(status)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown stock status: {status}")))?;
        query = query.filter(filter);
    }
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let products = state.stock.list(&query).await?;
    Ok(Envelope::ok("Stock data retrieved successfully", products))
}

/// GET /stock/stats
#[tracing::instrument(skip(state, _admin))]
pub async fn stats<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
) -> Result<Json<Envelope<StockStats>>, ApiError> {
    let stats = state.stock.stats().await?;
    Ok(Envelope::ok("Stock statistics retrieved successfully", stats))
}

/// GET /stock/low
#[tracing::instrument(skip(state, _admin))]
pub async fn low<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ProductsResponse {
    let products = state
        .stock
        .low_stock(
            page.limit.unwrap_or(DEFAULT_LIMIT),
            page.offset.unwrap_or(0),
        )
        .await?;
    Ok(Envelope::ok("Low stock products retrieved successfully", products))
}

/// GET /stock/out
#[tracing::instrument(skip(state, _admin))]
pub async fn out<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ProductsResponse {
    let products = state
        .stock
        .out_of_stock(
            page.limit.unwrap_or(DEFAULT_LIMIT),
            page.offset.unwrap_or(0),
        )
        .await?;
    Ok(Envelope::ok(
        "Out of stock products retrieved successfully",
        products,
    ))
}

/// GET /stock/top-sellers
#[tracing::instrument(skip(state, _admin))]
pub async fn top_sellers<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    ApiQuery(page): ApiQuery<PageParams>,
) -> ProductsResponse {
    let products = state.stock.top_sellers(page.limit.unwrap_or(10)).await?;
    Ok(Envelope::ok("Top selling products retrieved successfully", products))
}

/// PATCH /stock/{productId}
#[tracing::instrument(skip(state, admin, req))]
pub async fn set<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminPrincipal,
    Path(product_id): Path<String>,
    ApiJson(req): ApiJson<SetStockRequest>,
) -> Result<Json<Envelope<StockChange>>, ApiError> {
    let product_id: ProductId = parse_id("product", &product_id)?;
    let change = state.stock.set_stock(product_id, req.new_stock).await?;
    tracing::info!(
        %product_id,
        by = %admin.id(),
        reason = req.reason.as_deref().unwrap_or(""),
        change = change.change,
        "stock set"
    );
    Ok(Envelope::ok("Stock updated successfully", change))
}

/// PATCH /stock/{productId}/restock
#[tracing::instrument(skip(state, admin, req))]
pub async fn restock<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminPrincipal,
    Path(product_id): Path<String>,
    ApiJson(req): ApiJson<RestockRequest>,
) -> Result<Json<Envelope<Restock>>, ApiError> {
    let product_id: ProductId = parse_id("product", &product_id)?;
    let restock = state.stock.restock(product_id, req.quantity).await?;
    tracing::info!(
        %product_id,
        by = %admin.id(),
        reason = req.reason.as_deref().unwrap_or(""),
        added = restock.added,
        "product restocked"
    );
    Ok(Envelope::ok("Product restocked successfully", restock))
}
