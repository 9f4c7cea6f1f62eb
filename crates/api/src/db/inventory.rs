//! Inventory ledger.
//!
//! Stock counters live on `product`; every change to them appends a row to
//! `inventory_movement` in the same transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use andes_core::stock::Movement;
use andes_core::{MovementId, MovementKind, OrderId, ProductId, UserId};

use super::RepositoryError;
use crate::models::{InventoryMovement, Pagination};

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: i32,
    product_id: i32,
    kind: MovementKind,
    quantity: i32,
    order_id: Option<i32>,
    actor_id: Option<i32>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<MovementRow> for InventoryMovement {
    fn from(row: MovementRow) -> Self {
        Self {
            id: MovementId::new(row.id),
            product_id: ProductId::new(row.product_id),
            kind: row.kind,
            quantity: row.quantity,
            order_id: row.order_id.map(OrderId::new),
            actor_id: row.actor_id.map(UserId::new),
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

/// Where a movement came from.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementSource<'a> {
    pub order_id: Option<OrderId>,
    pub actor_id: Option<UserId>,
    pub reason: Option<&'a str>,
}

/// Repository for ledger reads.
pub struct InventoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> InventoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Movements for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
        pagination: Pagination,
    ) -> Result<(Vec<InventoryMovement>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, MovementRow>(
            r"
            SELECT id, product_id, kind, quantity, order_id, actor_id, reason, created_at
            FROM inventory_movement
            WHERE product_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(product_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inventory_movement WHERE product_id = $1")
                .bind(product_id)
                .fetch_one(self.pool)
                .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }
}

/// Append a movement to the ledger.
///
/// # Errors
///
/// Returns `RepositoryError::Invalid` for a zero quantity or a missing product.
pub async fn record(
    conn: &mut PgConnection,
    product_id: ProductId,
    movement: Movement,
    source: MovementSource<'_>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO inventory_movement (product_id, kind, quantity, order_id, actor_id, reason)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(product_id)
    .bind(movement.kind)
    .bind(movement.quantity)
    .bind(source.order_id)
    .bind(source.actor_id)
    .bind(source.reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
