//! HTTP API for checkout, order lifecycle, payment ledger and stock.
//!
//! Handlers are generic over the [`Store`] port so the same router runs on
//! PostgreSQL in production and the in-memory store in tests.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::{Extension, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::JwtKeys;
use routes::{orders, stock, transactions};
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    keys: Arc<JwtKeys>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(orders::create::<S>).get(orders::list::<S>),
        )
        .route("/orders/user", get(orders::for_customer::<S>))
        .route(
            "/orders/{id}",
            get(orders::get::<S>).delete(orders::delete::<S>),
        )
        .route("/orders/{id}/status", patch(orders::update_status::<S>))
        .route(
            "/orders/{id}/payment-status",
            patch(orders::update_payment_status::<S>),
        )
        .route("/orders/{id}/cancel", patch(orders::cancel::<S>))
        .route(
            "/transactions",
            post(transactions::create::<S>).get(transactions::list::<S>),
        )
        .route(
            "/transactions/stats/overview",
            get(transactions::stats::<S>),
        )
        .route(
            "/transactions/order/{order_id}",
            get(transactions::for_order::<S>),
        )
        .route("/transactions/{id}", get(transactions::get::<S>))
        .route(
            "/transactions/{id}/reconcile",
            patch(transactions::reconcile::<S>),
        )
        .route("/transactions/{id}/refund", post(transactions::refund::<S>))
        .route("/stock", get(stock::list::<S>))
        .route("/stock/stats", get(stock::stats::<S>))
        .route("/stock/low", get(stock::low::<S>))
        .route("/stock/out", get(stock::out::<S>))
        .route("/stock/top-sellers", get(stock::top_sellers::<S>))
        .route("/stock/{product_id}", patch(stock::set::<S>))
        .route("/stock/{product_id}/restock", patch(stock::restock::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(Extension(keys))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
