//! Checkout, order reads and order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId};
use domain::NewOrder;
use serde::Deserialize;
use store::{CustomerInfo, OrderDetails, OrderQuery, Store};

use crate::auth::{AdminPrincipal, Principal};
use crate::error::{ApiError, Envelope};
use crate::extract::{ApiJson, ApiQuery, OptionalJson, parse_id, parse_optional};
use crate::state::AppState;

type OrderResponse = Result<Json<Envelope<OrderDetails>>, ApiError>;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CustomerInfoRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub customer_info: CustomerInfoRequest,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    fn into_new_order(self) -> NewOrder {
        let CustomerInfoRequest {
            name,
            email,
            phone,
            address,
            notes: customer_notes,
        } = self.customer_info;

        let mut order = NewOrder::new(
            CustomerInfo {
                name,
                email,
                phone,
                address,
            },
            self.payment_method,
        );
        for item in self.items {
            order = order.item(item.product_id, item.quantity, item.unit_price);
        }
        if let Some(notes) = self.notes.or(customer_notes) {
            order = order.notes(notes);
        }
        order
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerOrdersParams {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

// -- Handlers --

/// POST /orders (public checkout)
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Envelope<OrderDetails>>), ApiError> {
    let details = state.orders().create_order(req.into_new_order()).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::ok("Order created successfully", details),
    ))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, principal))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    principal: Principal,
    Path(id): Path<String>,
) -> OrderResponse {
    let order_id: OrderId = parse_id("order", &id)?;
    let details = state
        .orders()
        .get_order(order_id)
        .await?
        // Someone else's order looks the same as a missing one.
        .filter(|details| principal.can_view(&details.order.customer.email))
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    Ok(Envelope::ok("Order retrieved successfully", details))
}

/// GET /orders (admin)
#[tracing::instrument(skip(state, _admin))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    ApiQuery(params): ApiQuery<ListOrdersParams>,
) -> Result<Json<Envelope<Vec<OrderDetails>>>, ApiError> {
    let mut query = OrderQuery::new();
    if let Some(status) = parse_optional(params.status.as_deref())? {
        query = query.status(status);
    }
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let orders = state.orders().list_orders(&query).await?;
    Ok(Envelope::ok("Orders retrieved successfully", orders))
}

/// GET /orders/user?email= (admin)
#[tracing::instrument(skip(state, _admin))]
pub async fn for_customer<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    ApiQuery(params): ApiQuery<CustomerOrdersParams>,
) -> Result<Json<Envelope<Vec<OrderDetails>>>, ApiError> {
    let email = params
        .email
        .ok_or_else(|| ApiError::BadRequest("Email query parameter is required".to_string()))?;
    let orders = state.orders().orders_for_customer(&email).await?;
    Ok(Envelope::ok("User orders retrieved successfully", orders))
}

/// PATCH /orders/{id}/status (admin)
#[tracing::instrument(skip(state, _admin, req))]
pub async fn update_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> OrderResponse {
    let order_id: OrderId = parse_id("order", &id)?;
    let status = req
        .status
        .ok_or_else(|| ApiError::BadRequest("Status is required".to_string()))?;

    let details = state.coordinator.update_status(order_id, status).await?;
    Ok(Envelope::ok("Order status updated successfully", details))
}

/// PATCH /orders/{id}/payment-status (admin)
#[tracing::instrument(skip(state, _admin, req))]
pub async fn update_payment_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdatePaymentStatusRequest>,
) -> OrderResponse {
    let order_id: OrderId = parse_id("order", &id)?;
    let payment_status = req
        .payment_status
        .ok_or_else(|| ApiError::BadRequest("Payment status is required".to_string()))?;

    let details = state
        .coordinator
        .update_payment_status(order_id, payment_status)
        .await?;
    Ok(Envelope::ok(
        "Order payment status updated successfully",
        details,
    ))
}

/// PATCH /orders/{id}/cancel (admin)
#[tracing::instrument(skip(state, _admin, req))]
pub async fn cancel<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path(id): Path<String>,
    OptionalJson(req): OptionalJson<CancelOrderRequest>,
) -> OrderResponse {
    let order_id: OrderId = parse_id("order", &id)?;
    let details = state.coordinator.cancel_order(order_id, req.reason).await?;
    Ok(Envelope::ok("Order cancelled successfully", details))
}

/// DELETE /orders/{id} (admin). Orders are never removed; this cancels.
#[tracing::instrument(skip(state, _admin))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    state.coordinator.cancel_order(order_id, None).await?;
    Ok(Envelope::message("Order cancelled successfully"))
}
