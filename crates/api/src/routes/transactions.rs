//! Payment ledger endpoints. All require an admin.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, OrderId, PaymentMethod, TransactionId, TransactionType};
use domain::NewPayment;
use serde::Deserialize;
use store::{Store, TransactionQuery, TransactionRecord, TransactionStats};

use crate::auth::AdminPrincipal;
use crate::error::{ApiError, Envelope};
use crate::extract::{ApiJson, ApiQuery, parse_id, parse_optional};
use crate::state::AppState;

type TransactionResponse = Result<Json<Envelope<TransactionRecord>>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub order_id: OrderId,
    pub customer_fullname: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub method_of_payment: PaymentMethod,
    #[serde(default)]
    pub transaction_type: TransactionType,
    pub total_amount: Money,
    pub total_amount_received: Option<Money>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsParams {
    pub status: Option<String>,
    pub transaction_type: Option<String>,
    pub method_of_payment: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub refund_amount: Money,
    #[serde(default)]
    pub reason: String,
}

/// POST /transactions
#[tracing::instrument(skip(state, admin, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminPrincipal,
    ApiJson(req): ApiJson<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Envelope<TransactionRecord>>), ApiError> {
    let payment = NewPayment {
        order_id: req.order_id,
        customer_name: req.customer_fullname,
        customer_email: req.customer_email,
        customer_phone: req.customer_phone,
        method: req.method_of_payment,
        transaction_type: req.transaction_type,
        amount: req.total_amount,
        amount_received: req.total_amount_received,
        received_by: admin.id().to_string(),
        notes: req.notes,
    };

    let record = state.ledger.record_payment(payment).await?;
    Ok((
        StatusCode::CREATED,
        Envelope::ok("Transaction created successfully", record),
    ))
}

/// GET /transactions
#[tracing::instrument(skip(state, _admin))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    ApiQuery(params): ApiQuery<ListTransactionsParams>,
) -> Result<Json<Envelope<Vec<TransactionRecord>>>, ApiError> {
    let mut query = TransactionQuery::new();
    if let Some(status) = parse_optional(params.status.as_deref())? {
        query = query.status(status);
    }
    if let Some(kind) = parse_optional(params.transaction_type.as_deref())? {
        query = query.transaction_type(kind);
    }
    if let Some(method) = parse_optional(params.method_of_payment.as_deref())? {
        query = query.method(method);
    }
    if let Some(limit) = params.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.offset(offset);
    }

    let records = state.ledger.list(&query).await?;
    Ok(Envelope::ok("Transactions retrieved successfully", records))
}

/// GET /transactions/{id}
#[tracing::instrument(skip(state, _admin))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path(id): Path<String>,
) -> TransactionResponse {
    let id: TransactionId = parse_id("transaction", &id)?;
    let record = state
        .ledger
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))?;
    Ok(Envelope::ok("Transaction retrieved successfully", record))
}

/// GET /transactions/order/{orderId}
#[tracing::instrument(skip(state, _admin))]
pub async fn for_order<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
    Path(order_id): Path<String>,
) -> Result<Json<Envelope<Vec<TransactionRecord>>>, ApiError> {
    let order_id: OrderId = parse_id("order", &order_id)?;
    let records = state.ledger.for_order(order_id).await?;
    Ok(Envelope::ok(
        "Order transactions retrieved successfully",
        records,
    ))
}

/// PATCH /transactions/{id}/reconcile
#[tracing::instrument(skip(state, admin, req))]
pub async fn reconcile<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminPrincipal,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReconcileRequest>,
) -> TransactionResponse {
    let id: TransactionId = parse_id("transaction", &id)?;
    let record = state.ledger.reconcile(id, admin.id(), req.notes).await?;
    Ok(Envelope::ok("Transaction reconciled successfully", record))
}

/// POST /transactions/{id}/refund
#[tracing::instrument(skip(state, admin, req))]
pub async fn refund<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminPrincipal,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RefundRequest>,
) -> Result<(StatusCode, Json<Envelope<TransactionRecord>>), ApiError> {
    let id: TransactionId = parse_id("transaction", &id)?;
    let record = state
        .ledger
        .refund(id, req.refund_amount, admin.id(), &req.reason)
        .await?;
    Ok((
        StatusCode::CREATED,
        Envelope::ok("Refund processed successfully", record),
    ))
}

/// GET /transactions/stats/overview
#[tracing::instrument(skip(state, _admin))]
pub async fn stats<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminPrincipal,
) -> Result<Json<Envelope<TransactionStats>>, ApiError> {
    let stats = state.ledger.stats().await?;
    Ok(Envelope::ok(
        "Transaction statistics retrieved successfully",
        stats,
    ))
}
