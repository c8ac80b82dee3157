//! Payment ledger: append-only entries with one-way reconciliation.

use chrono::{DateTime, Utc};
use common::{
    Money, OrderId, PaymentMethod, PaymentStatus, TransactionId, TransactionType, UserId,
};
use serde::{Deserialize, Serialize};
use store::{
    Store, StoreTx, TransactionDetails, TransactionQuery, TransactionRecord, TransactionStats,
};
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::note::append_note;
use crate::unit_of_work::abort;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// `<prefix>-<unix millis>-<6 base36 chars>`.
pub fn generate_transaction_number(prefix: &str, now: DateTime<Utc>) -> String {
    let mut bits = Uuid::new_v4().as_u128();
    let suffix: String = (0..6)
        .map(|_| {
            let c = BASE36[(bits % 36) as usize] as char;
            bits /= 36;
            c
        })
        .collect();
    format!("{prefix}-{}-{suffix}", now.timestamp_millis())
}

/// A payment to record against an order. Customer fields default to the
/// order's snapshot when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    pub order_id: OrderId,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub method: PaymentMethod,
    #[serde(default)]
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub amount_received: Option<Money>,
    pub received_by: String,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn new(
        order_id: OrderId,
        method: PaymentMethod,
        amount: Money,
        received_by: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            method,
            transaction_type: TransactionType::OrderPayment,
            amount,
            amount_received: None,
            received_by: received_by.into(),
            notes: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(DomainError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if self.amount_received.is_some_and(|m| m.is_negative()) {
            return Err(DomainError::Validation(
                "amount received cannot be negative".to_string(),
            ));
        }
        if self.received_by.trim().is_empty() {
            return Err(DomainError::Validation(
                "received by is required".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct LedgerService<S: Store> {
    store: S,
}

impl<S: Store> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends a paid entry for an existing order.
    #[tracing::instrument(skip(self, payment), fields(order_id = %payment.order_id))]
    pub async fn record_payment(&self, payment: NewPayment) -> Result<TransactionRecord> {
        payment.validate()?;

        let mut tx = self.store.begin().await?;
        let record = match insert_payment(tx.as_mut(), payment).await {
            Ok(record) => record,
            Err(e) => {
                abort(tx, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        metrics::counter!(
            "ledger_entries_total",
            "type" => record.transaction_type.as_str(),
            "method" => record.method.as_str()
        )
        .increment(1);
        tracing::info!(
            transaction_number = %record.transaction_number,
            amount = %record.amount,
            "payment recorded"
        );
        Ok(record)
    }

    pub async fn get(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        Ok(self.store.transaction(id).await?)
    }

    pub async fn require(&self, id: TransactionId) -> Result<TransactionRecord> {
        self.get(id)
            .await?
            .ok_or_else(|| DomainError::not_found("transaction", id))
    }

    pub async fn for_order(&self, order_id: OrderId) -> Result<Vec<TransactionRecord>> {
        Ok(self.store.transactions_for_order(order_id).await?)
    }

    pub async fn list(&self, query: &TransactionQuery) -> Result<Vec<TransactionRecord>> {
        Ok(self.store.list_transactions(query).await?)
    }

    pub async fn stats(&self) -> Result<TransactionStats> {
        Ok(self.store.transaction_stats().await?)
    }

    /// Marks an entry reconciled. The flag is one-way: a second reconcile is
    /// a state conflict.
    #[tracing::instrument(skip(self, notes))]
    pub async fn reconcile(
        &self,
        id: TransactionId,
        reconciled_by: UserId,
        notes: Option<String>,
    ) -> Result<TransactionRecord> {
        let mut tx = self.store.begin().await?;
        let record = match mark_reconciled(tx.as_mut(), id, reconciled_by, notes).await {
            Ok(record) => record,
            Err(e) => {
                abort(tx, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        metrics::counter!("transactions_reconciled_total").increment(1);
        tracing::info!(transaction_number = %record.transaction_number, "transaction reconciled");
        Ok(record)
    }

    /// Books a refund against a paid payment entry as a new negative entry.
    /// Refunds against one payment entry never exceed its amount in total.
    #[tracing::instrument(skip(self, reason))]
    pub async fn refund(
        &self,
        original_id: TransactionId,
        amount: Money,
        refunded_by: UserId,
        reason: &str,
    ) -> Result<TransactionRecord> {
        if !amount.is_positive() {
            return Err(DomainError::Validation(
                "refund amount must be positive".to_string(),
            ));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::Validation(
                "refund reason is required".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let record = match insert_refund(tx.as_mut(), original_id, amount, refunded_by, reason).await
        {
            Ok(record) => record,
            Err(e) => {
                abort(tx, &e).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        metrics::counter!(
            "ledger_entries_total",
            "type" => record.transaction_type.as_str(),
            "method" => record.method.as_str()
        )
        .increment(1);
        tracing::info!(
            transaction_number = %record.transaction_number,
            %original_id,
            amount = %record.amount,
            "refund recorded"
        );
        Ok(record)
    }
}

async fn insert_payment(tx: &mut dyn StoreTx, payment: NewPayment) -> Result<TransactionRecord> {
    let order = tx
        .lock_order(payment.order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("order", payment.order_id))?;

    let now = Utc::now();
    let (prefix, amount) = match payment.transaction_type {
        TransactionType::OrderPayment => ("TXN", payment.amount),
        TransactionType::OrderRefund => ("REF", -payment.amount),
    };
    let record = TransactionRecord {
        id: TransactionId::new(),
        transaction_number: generate_transaction_number(prefix, now),
        order_id: order.id,
        customer_name: payment.customer_name.unwrap_or(order.customer.name),
        customer_email: payment.customer_email.unwrap_or(order.customer.email),
        customer_phone: payment.customer_phone.or(Some(order.customer.phone)),
        method: payment.method,
        transaction_type: payment.transaction_type,
        payment_status: PaymentStatus::Paid,
        amount,
        refund_of: None,
        details: TransactionDetails {
            id: Uuid::new_v4(),
            method: payment.method,
            amount_received: payment.amount_received,
            received_by: payment.received_by.trim().to_string(),
            notes: payment.notes.filter(|n| !n.trim().is_empty()),
        },
        reconciled: false,
        reconciled_by: None,
        reconciled_at: None,
        created_at: now,
        updated_at: now,
    };
    tx.insert_transaction(&record).await?;
    Ok(record)
}

async fn mark_reconciled(
    tx: &mut dyn StoreTx,
    id: TransactionId,
    reconciled_by: UserId,
    notes: Option<String>,
) -> Result<TransactionRecord> {
    let mut record = tx
        .lock_transaction(id)
        .await?
        .ok_or_else(|| DomainError::not_found("transaction", id))?;
    if record.reconciled {
        return Err(DomainError::StateConflict(format!(
            "transaction {} is already reconciled",
            record.transaction_number
        )));
    }

    let now = Utc::now();
    record.reconciled = true;
    record.reconciled_by = Some(reconciled_by);
    record.reconciled_at = Some(now);
    record.updated_at = now;
    if let Some(notes) = notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        record.details.notes = Some(append_note(
            record.details.notes.as_deref(),
            &format!("Reconciliation: {notes}"),
        ));
    }
    tx.update_reconciliation(&record).await?;
    Ok(record)
}

async fn insert_refund(
    tx: &mut dyn StoreTx,
    original_id: TransactionId,
    amount: Money,
    refunded_by: UserId,
    reason: &str,
) -> Result<TransactionRecord> {
    let original = tx
        .lock_transaction(original_id)
        .await?
        .ok_or_else(|| DomainError::not_found("transaction", original_id))?;
    if original.transaction_type != TransactionType::OrderPayment
        || original.payment_status != PaymentStatus::Paid
    {
        return Err(DomainError::StateConflict(format!(
            "transaction {} is not a paid payment",
            original.transaction_number
        )));
    }

    let already_refunded = tx.refunded_total(original.id).await?;
    let refundable = original.amount - already_refunded;
    if amount > refundable {
        return Err(DomainError::Validation(format!(
            "refund of {amount} exceeds refundable amount {refundable}"
        )));
    }

    let now = Utc::now();
    let record = TransactionRecord {
        id: TransactionId::new(),
        transaction_number: generate_transaction_number("REF", now),
        order_id: original.order_id,
        customer_name: original.customer_name,
        customer_email: original.customer_email,
        customer_phone: original.customer_phone,
        method: original.method,
        transaction_type: TransactionType::OrderRefund,
        payment_status: PaymentStatus::Paid,
        amount: -amount.abs(),
        refund_of: Some(original.id),
        details: TransactionDetails {
            id: Uuid::new_v4(),
            method: original.method,
            amount_received: None,
            received_by: refunded_by.to_string(),
            notes: Some(format!(
                "Refund for transaction {}. Reason: {reason}",
                original.transaction_number
            )),
        },
        reconciled: true,
        reconciled_by: Some(refunded_by),
        reconciled_at: Some(now),
        created_at: now,
        updated_at: now,
    };
    tx.insert_transaction(&record).await?;
    Ok(record)
}
