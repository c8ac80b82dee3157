use store::StoreTx;

/// Rolls back a failed unit of work. A rollback failure is only logged; the
/// caller still returns the original error.
pub async fn abort(tx: Box<dyn StoreTx>, reason: &(dyn std::fmt::Display + Sync)) {
    tracing::debug!(%reason, "rolling back");
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, %reason, "rollback failed");
    }
}
