//! Stock movements and their compensations.
//!
//! A paid order holds a sale plan: one outbound movement per line. Undoing
//! the sale runs the inverse of every movement in reverse order, so the
//! cancellation path is the structural mirror of the payment path.

use common::ProductId;
use domain::DomainError;
use store::{LineItemRecord, StoreTx};

use crate::error::Result;

/// Step name: decrement stock for every line when payment lands.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";

/// Step name: return stock for every line when payment is reversed.
pub const STEP_RELEASE_STOCK: &str = "release_stock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `stock -= q, total_sold += q`, guarded by `stock >= q`.
    Out,
    /// `stock += q, total_sold = max(total_sold - q, 0)`.
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub quantity: u32,
    pub direction: Direction,
}

impl StockMovement {
    pub fn out(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            direction: Direction::Out,
        }
    }

    /// The movement that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            direction: match self.direction {
                Direction::Out => Direction::In,
                Direction::In => Direction::Out,
            },
            ..*self
        }
    }

    /// Applies the movement inside the caller's unit of work.
    pub async fn apply(&self, tx: &mut dyn StoreTx) -> Result<()> {
        match self.direction {
            Direction::Out => {
                if !tx.decrement_stock(self.product_id, self.quantity).await? {
                    return Err(self.shortfall(tx).await?.into());
                }
                // Re-read inside the same transaction; the guarded update
                // should make this unreachable.
                match tx.lock_stock(self.product_id).await? {
                    None => Err(DomainError::not_found("product", self.product_id).into()),
                    Some(counts) if counts.stock < 0 => Err(DomainError::InsufficientStock {
                        product_id: self.product_id,
                        requested: self.quantity,
                        available: counts.stock,
                    }
                    .into()),
                    Some(_) => Ok(()),
                }
            }
            Direction::In => {
                if tx.restore_stock(self.product_id, self.quantity).await? {
                    Ok(())
                } else {
                    Err(DomainError::not_found("product", self.product_id).into())
                }
            }
        }
    }

    async fn shortfall(&self, tx: &mut dyn StoreTx) -> Result<DomainError> {
        Ok(match tx.lock_stock(self.product_id).await? {
            None => DomainError::not_found("product", self.product_id),
            Some(counts) => DomainError::InsufficientStock {
                product_id: self.product_id,
                requested: self.quantity,
                available: counts.stock,
            },
        })
    }
}

/// One outbound movement per order line, in line order.
pub fn sale_plan(lines: &[LineItemRecord]) -> Vec<StockMovement> {
    lines
        .iter()
        .map(|line| StockMovement::out(line.product_id, line.quantity))
        .collect()
}

/// The inverse of every movement, in reverse order.
pub fn compensation(plan: &[StockMovement]) -> Vec<StockMovement> {
    plan.iter().rev().map(StockMovement::inverse).collect()
}

/// Applies movements in order, stopping at the first failure. Earlier
/// movements are undone by the caller rolling back the unit of work.
pub async fn apply_all(tx: &mut dyn StoreTx, movements: &[StockMovement]) -> Result<u64> {
    let mut units = 0u64;
    for movement in movements {
        movement.apply(tx).await?;
        units += u64::from(movement.quantity);
    }
    Ok(units)
}
