//! Payment transaction repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use andes_core::{Clp, OrderId, PaymentId, PaymentStatus};

use super::RepositoryError;
use crate::models::PaymentTransaction;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    order_id: i32,
    provider: String,
    token: Option<String>,
    gateway_order: Option<String>,
    amount: i64,
    status: PaymentStatus,
    gateway_status: Option<i32>,
    payer_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for PaymentTransaction {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: PaymentId::new(row.id),
            order_id: OrderId::new(row.order_id),
            provider: row.provider,
            token: row.token,
            gateway_order: row.gateway_order,
            amount: Clp::new(row.amount),
            status: row.status,
            gateway_status: row.gateway_status,
            payer_email: row.payer_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PAYMENT_COLUMNS: &str = "id, order_id, provider, token, gateway_order, amount, status, \
    gateway_status, payer_email, created_at, updated_at";

/// Gateway outcome written back onto a transaction.
#[derive(Debug, Clone)]
pub struct PaymentOutcome<'a> {
    pub status: PaymentStatus,
    pub gateway_status: Option<i32>,
    pub gateway_order: Option<&'a str>,
    pub payer_email: Option<&'a str>,
    pub raw_response: &'a serde_json::Value,
}

/// Repository for payment transactions.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open an `initiated` transaction for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the order does not exist.
    pub async fn create(
        &self,
        order_id: OrderId,
        provider: &str,
        amount: Clp,
    ) -> Result<PaymentTransaction, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            INSERT INTO payment_transaction (order_id, provider, amount)
            VALUES ($1, $2, $3)
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(order_id)
        .bind(provider)
        .bind(amount)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Store the token and gateway order number returned when the payment
    /// was registered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the token is already in use.
    pub async fn attach_token(
        &self,
        id: PaymentId,
        token: &str,
        gateway_order: Option<&str>,
    ) -> Result<PaymentTransaction, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            UPDATE payment_transaction
            SET token = $2, gateway_order = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(token)
        .bind(gateway_order)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Set the status of a transaction that never reached the gateway.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark(&self, id: PaymentId, status: PaymentStatus) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE payment_transaction SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Transactions for an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<PaymentTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            SELECT {PAYMENT_COLUMNS} FROM payment_transaction
            WHERE order_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a transaction by gateway token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_token(
        &self,
        token: &str,
    ) -> Result<Option<PaymentTransaction>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment_transaction WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

/// Lock a transaction by gateway token.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_by_token(
    conn: &mut PgConnection,
    token: &str,
) -> Result<Option<PaymentTransaction>, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payment_transaction WHERE token = $1 FOR UPDATE"
    ))
    .bind(token)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Record what the gateway reported for a transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order already has a paid
/// transaction.
pub async fn record_outcome(
    conn: &mut PgConnection,
    id: PaymentId,
    outcome: &PaymentOutcome<'_>,
) -> Result<PaymentTransaction, RepositoryError> {
    let row = sqlx::query_as::<_, PaymentRow>(&format!(
        r"
        UPDATE payment_transaction SET
            status = $2,
            gateway_status = $3,
            gateway_order = COALESCE($4, gateway_order),
            payer_email = COALESCE($5, payer_email),
            raw_response = $6,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {PAYMENT_COLUMNS}
        "
    ))
    .bind(id)
    .bind(outcome.status)
    .bind(outcome.gateway_status)
    .bind(outcome.gateway_order)
    .bind(outcome.payer_email)
    .bind(outcome.raw_response)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}
