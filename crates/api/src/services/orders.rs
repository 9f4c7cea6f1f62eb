//! Order lifecycle.
//!
//! All status changes go through [`transition_locked`], which checks the
//! move against [`OrderStatus::can_transition_to`] and applies its stock side
//! effect in the caller's transaction:
//!
//! | from                 | to          | stock                     |
//! |----------------------|-------------|---------------------------|
//! | `pending_payment`    | `paid`      | reservation becomes sale  |
//! | `pending_payment`    | `cancelled` | reservation released      |
//! | `paid`, `processing` | `cancelled` | units returned on hand    |
//! | `paid`               | `refunded`  | units returned on hand    |
//! | `delivered`          | `refunded`  | none (goods left the shop)|

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, warn};

use andes_core::OrderStatus;
use andes_core::UserId;
use andes_core::stock::StockError;

use crate::db::RepositoryError;
use crate::db::orders;
use crate::models::Order;
use crate::services::inventory::{StockOp, apply_order_stock};

/// Orders expired per transaction by [`OrderService::expire_reservations`].
pub const EXPIRY_BATCH: i64 = 100;

#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("order not found")]
    NotFound,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("stock error: {0}")]
    Stock(#[from] StockError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// Stock side effect of moving an order from `from` to `to`.
#[must_use]
pub const fn stock_effect(from: OrderStatus, to: OrderStatus) -> Option<StockOp> {
    match (from, to) {
        (OrderStatus::PendingPayment, OrderStatus::Paid) => Some(StockOp::Commit),
        (OrderStatus::PendingPayment, OrderStatus::Cancelled) => Some(StockOp::Release),
        (OrderStatus::Paid | OrderStatus::Processing, OrderStatus::Cancelled)
        | (OrderStatus::Paid, OrderStatus::Refunded) => Some(StockOp::Return),
        _ => None,
    }
}

/// Move a locked order to `to`, applying its stock side effect.
///
/// # Errors
///
/// Returns `OrderServiceError::InvalidTransition` for a move the lifecycle
/// does not allow, or a stock/repository error.
pub async fn transition_locked(
    conn: &mut PgConnection,
    order: &Order,
    to: OrderStatus,
) -> Result<Order, OrderServiceError> {
    if !order.status.can_transition_to(to) {
        return Err(OrderServiceError::InvalidTransition {
            from: order.status,
            to,
        });
    }

    if let Some(op) = stock_effect(order.status, to) {
        apply_order_stock::<OrderServiceError>(conn, order.id, op).await?;
    }

    let updated = orders::set_status(conn, order.id, to).await?;
    info!(
        order_number = %updated.number,
        from = %order.status,
        to = %to,
        "Order status changed"
    );
    Ok(updated)
}

/// Customer and staff order operations.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Cancel one of the customer's own orders while it awaits payment.
    ///
    /// # Errors
    ///
    /// Returns `OrderServiceError::NotFound` when the order does not exist or
    /// belongs to someone else, `InvalidTransition` once it has been paid.
    pub async fn cancel_by_customer(
        &self,
        user_id: UserId,
        number: &str,
    ) -> Result<Order, OrderServiceError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock_by_number(&mut tx, number)
            .await?
            .filter(|o| o.user_id == Some(user_id))
            .ok_or(OrderServiceError::NotFound)?;

        if order.status != OrderStatus::PendingPayment {
            return Err(OrderServiceError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        let cancelled = transition_locked(&mut tx, &order, OrderStatus::Cancelled).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Staff status change.
    ///
    /// # Errors
    ///
    /// Returns `OrderServiceError::NotFound` or `InvalidTransition`.
    pub async fn transition(
        &self,
        number: &str,
        to: OrderStatus,
    ) -> Result<(Order, OrderStatus), OrderServiceError> {
        let mut tx = self.pool.begin().await?;

        let order = orders::lock_by_number(&mut tx, number)
            .await?
            .ok_or(OrderServiceError::NotFound)?;
        let previous = order.status;

        let updated = transition_locked(&mut tx, &order, to).await?;
        tx.commit().await?;
        Ok((updated, previous))
    }

    /// Cancel pending orders whose reservation ran out and release their
    /// stock. Returns how many orders were cancelled.
    ///
    /// Works in batches of [`EXPIRY_BATCH`]; rows locked by a concurrent
    /// payment confirmation are skipped and picked up on the next run.
    ///
    /// # Errors
    ///
    /// Returns a repository error when a batch fails; earlier batches stay
    /// committed.
    pub async fn expire_reservations(&self, now: DateTime<Utc>) -> Result<usize, OrderServiceError> {
        let mut expired = 0;
        loop {
            let mut tx = self.pool.begin().await?;
            let batch = orders::lock_expired(&mut tx, now, EXPIRY_BATCH).await?;
            if batch.is_empty() {
                break;
            }

            let count = batch.len();
            for order in &batch {
                transition_locked(&mut tx, order, OrderStatus::Cancelled).await?;
                warn!(order_number = %order.number, "Reservation expired, order cancelled");
            }
            tx.commit().await?;

            expired += count;
            if i64::try_from(count).unwrap_or(i64::MAX) < EXPIRY_BATCH {
                break;
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_effects() {
        use OrderStatus::{Cancelled, Delivered, Paid, PendingPayment, Processing, Refunded, Shipped};

        assert_eq!(stock_effect(PendingPayment, Paid), Some(StockOp::Commit));
        assert_eq!(stock_effect(PendingPayment, Cancelled), Some(StockOp::Release));
        assert_eq!(stock_effect(Paid, Cancelled), Some(StockOp::Return));
        assert_eq!(stock_effect(Processing, Cancelled), Some(StockOp::Return));
        assert_eq!(stock_effect(Paid, Refunded), Some(StockOp::Return));
        assert_eq!(stock_effect(Delivered, Refunded), None);
        assert_eq!(stock_effect(Paid, Processing), None);
        assert_eq!(stock_effect(Shipped, Delivered), None);
    }

    #[test]
    fn test_every_allowed_transition_is_covered() {
        // Allowed moves out of a state holding stock must say what happens to it.
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                if !from.can_transition_to(to) {
                    continue;
                }
                if from.holds_reservation() {
                    assert!(stock_effect(from, to).is_some(), "{from} -> {to}");
                }
            }
        }
    }

    #[test]
    fn test_transition_error_message() {
        let err = OrderServiceError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "cannot move order from shipped to cancelled");
    }
}
