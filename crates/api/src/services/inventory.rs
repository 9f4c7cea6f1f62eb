//! Stock changes and their ledger entries.
//!
//! Every write locks the product rows, runs the counter arithmetic from
//! `andes_core::stock`, stores the new counters and appends one
//! `inventory_movement` row per product, all on the caller's connection.

use sqlx::{PgConnection, PgPool};
use tracing::info;

use andes_core::stock::{Movement, StockError, StockLevel};
use andes_core::{MovementKind, OrderId, ProductId, UserId};

use crate::db::RepositoryError;
use crate::db::inventory::{self, MovementSource};
use crate::db::orders;
use crate::db::products::{lock_for_update, write_stock};
use crate::error::AppError;
use crate::models::{AdjustmentKind, Product, StockAdjustment};

/// What happens to an order's stock when its status changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockOp {
    /// Drop the reservation (cancelled or expired before payment).
    Release,
    /// Turn the reservation into a sale (payment confirmed).
    Commit,
    /// Put sold units back on hand (cancelled or refunded after payment).
    Return,
}

impl StockOp {
    fn apply(self, level: StockLevel, quantity: i32) -> Result<(StockLevel, Movement), StockError> {
        match self {
            Self::Release => level.release(quantity),
            Self::Commit => level.commit(quantity),
            Self::Return => level.receive(quantity, MovementKind::Return),
        }
    }
}

/// Apply `op` to every product on an order.
///
/// # Errors
///
/// Returns a stock error when the counters do not allow the change, or a
/// repository error when a query fails.
pub async fn apply_order_stock<E>(
    conn: &mut PgConnection,
    order_id: OrderId,
    op: StockOp,
) -> Result<(), E>
where
    E: From<StockError> + From<RepositoryError>,
{
    let lines = orders::stock_lines(conn, order_id).await?;
    if lines.is_empty() {
        return Ok(());
    }

    let ids: Vec<ProductId> = lines.iter().map(|(id, _)| *id).collect();
    let products = lock_for_update(conn, &ids).await?;

    for (product_id, quantity) in lines {
        let product = products.iter().find(|p| p.id == product_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "order {order_id} references product {product_id} which could not be locked"
            ))
        })?;
        let (level, movement) = op.apply(product.stock, quantity)?;
        write_stock(conn, product_id, level).await?;
        inventory::record(
            conn,
            product_id,
            movement,
            MovementSource {
                order_id: Some(order_id),
                ..MovementSource::default()
            },
        )
        .await?;
    }
    Ok(())
}

/// Restock or correct a product's on-hand count.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown product, `AppError::Stock`
/// when the change would break the counters and `AppError::BadRequest` for a
/// non-positive restock.
pub async fn adjust_stock(
    pool: &PgPool,
    product_id: ProductId,
    adjustment: &StockAdjustment,
    actor_id: Option<UserId>,
) -> Result<Product, AppError> {
    let kind = adjustment.resolved_kind();
    if kind == AdjustmentKind::Restock && adjustment.delta <= 0 {
        return Err(AppError::BadRequest(
            "restock delta must be positive".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let mut product = lock_for_update(&mut tx, &[product_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let (level, movement) = match kind {
        AdjustmentKind::Restock => product.stock.receive(adjustment.delta, MovementKind::Restock)?,
        AdjustmentKind::Adjustment => product.stock.adjust(adjustment.delta)?,
    };
    write_stock(&mut tx, product_id, level).await?;
    inventory::record(
        &mut tx,
        product_id,
        movement,
        MovementSource {
            actor_id,
            reason: adjustment.reason(),
            ..MovementSource::default()
        },
    )
    .await?;

    tx.commit().await?;

    info!(
        product_id = %product_id,
        kind = ?movement.kind,
        quantity = movement.quantity,
        on_hand = level.on_hand,
        "Stock adjusted"
    );

    product.stock = level;
    Ok(product)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_ops() {
        let level = StockLevel::new(10, 4).unwrap();

        let (released, mv) = StockOp::Release.apply(level, 4).unwrap();
        assert_eq!(released, StockLevel::new(10, 0).unwrap());
        assert_eq!(mv.kind, MovementKind::Release);

        let (sold, mv) = StockOp::Commit.apply(level, 4).unwrap();
        assert_eq!(sold, StockLevel::new(6, 0).unwrap());
        assert_eq!(mv.kind, MovementKind::Sale);

        let (returned, mv) = StockOp::Return.apply(sold, 4).unwrap();
        assert_eq!(returned, StockLevel::new(10, 0).unwrap());
        assert_eq!(mv.kind, MovementKind::Return);
        assert_eq!(mv.quantity, 4);
    }

    #[test]
    fn test_release_needs_reservation() {
        let level = StockLevel::new(10, 1).unwrap();
        assert!(matches!(
            StockOp::Release.apply(level, 2),
            Err(StockError::NotReserved { .. })
        ));
    }
}
