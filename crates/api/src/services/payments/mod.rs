//! Payments through the HMAC-signed gateway.
//!
//! Starting a payment opens an `initiated` transaction and registers it with
//! the gateway. The gateway later calls the webhook with the payment token;
//! the webhook asks the gateway for the real status, checks the amount and,
//! when paid, confirms the order, turning its reservation into a sale.

pub mod gateway;

pub use gateway::{GatewayClient, GatewayError, GatewayStatus};

use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, warn};

use andes_core::{Clp, OrderStatus, PaymentStatus, UserId};

use crate::db::payments::{self, PaymentOutcome};
use crate::db::{OrderRepository, PaymentRepository, RepositoryError, orders};
use crate::models::{Order, PaymentTransaction};
use crate::services::orders::{OrderServiceError, transition_locked};
use gateway::CreatePayment;

/// Provider name stored on transactions.
pub const PROVIDER: &str = "flow";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("gateway reported {reported}, order total is {expected}")]
    AmountMismatch { expected: Clp, reported: Clp },

    #[error("order is {0} and cannot be paid")]
    NotPayable(OrderStatus),

    #[error("payment not found")]
    UnknownToken,

    #[error("order not found")]
    OrderNotFound,

    #[error("{0}")]
    Order(#[from] OrderServiceError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// Payer-facing result of starting a payment.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StartedPayment {
    pub redirect_url: String,
    pub token: String,
}

/// Payment status as shown on the return page.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaymentReport {
    pub order_number: String,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub amount: Clp,
}

/// Payment workflows.
pub struct PaymentService<'a> {
    pool: &'a PgPool,
    gateway: &'a GatewayClient,
    base_url: &'a str,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, gateway: &'a GatewayClient, base_url: &'a str) -> Self {
        Self {
            pool,
            gateway,
            base_url,
        }
    }

    /// Register a payment for one of the user's pending orders.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` for an unknown or foreign order,
    /// `NotPayable` when it no longer awaits payment and `Gateway` when the
    /// gateway refuses it. A refused transaction is stored as `cancelled`.
    pub async fn start(
        &self,
        user_id: UserId,
        payer_email: &str,
        number: &str,
    ) -> Result<StartedPayment, PaymentError> {
        let order = OrderRepository::new(self.pool)
            .get_by_number(number)
            .await?
            .filter(|o| o.user_id == Some(user_id))
            .ok_or(PaymentError::OrderNotFound)?;
        if order.status != OrderStatus::PendingPayment {
            return Err(PaymentError::NotPayable(order.status));
        }

        let repo = PaymentRepository::new(self.pool);
        let transaction = repo.create(order.id, PROVIDER, order.total).await?;

        let subject = format!("Andes Market pedido {}", order.number);
        let url_confirmation = format!("{}/api/payments/webhook", self.base_url);
        let url_return = format!("{}/api/payments/return", self.base_url);
        let registered = match self
            .gateway
            .create_payment(&CreatePayment {
                commerce_order: &order.number,
                subject: &subject,
                amount: order.total,
                email: payer_email,
                url_confirmation: &url_confirmation,
                url_return: &url_return,
            })
            .await
        {
            Ok(registered) => registered,
            Err(e) => {
                warn!(order_number = %order.number, error = %e, "Gateway refused payment");
                repo.mark(transaction.id, PaymentStatus::Cancelled).await?;
                return Err(e.into());
            }
        };

        repo.attach_token(
            transaction.id,
            &registered.token,
            registered.gateway_order.as_deref(),
        )
        .await?;

        info!(order_number = %order.number, payment_id = %transaction.id, "Payment started");
        Ok(StartedPayment {
            redirect_url: registered.redirect_url,
            token: registered.token,
        })
    }

    /// Handle a gateway notification for `token`.
    ///
    /// Safe to call any number of times: once a transaction holds a final
    /// status, later notifications change nothing.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::UnknownToken` for a token we never issued and
    /// `AmountMismatch` when the paid amount differs from the order total. A
    /// mismatched payment is stored as `rejected`.
    pub async fn confirm(&self, token: &str) -> Result<PaymentTransaction, PaymentError> {
        // Reject unknown tokens before calling out.
        PaymentRepository::new(self.pool)
            .get_by_token(token)
            .await?
            .ok_or(PaymentError::UnknownToken)?;

        let reported = self.gateway.get_status(token).await?;

        let mut tx = self.pool.begin().await?;

        let transaction = payments::lock_by_token(&mut tx, token)
            .await?
            .ok_or(PaymentError::UnknownToken)?;
        if transaction.status.is_final() {
            info!(payment_id = %transaction.id, status = ?transaction.status, "Duplicate payment notification ignored");
            return Ok(transaction);
        }

        let Some(status) = reported.status.payment_status() else {
            return Ok(transaction);
        };

        let order = orders::lock_by_id(&mut tx, transaction.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        let mismatch = status == PaymentStatus::Paid && reported.amount != order.total;
        let outcome = PaymentOutcome {
            status: if mismatch { PaymentStatus::Rejected } else { status },
            gateway_status: Some(reported.status_code),
            gateway_order: reported.gateway_order.as_deref(),
            payer_email: reported.payer_email.as_deref(),
            raw_response: &reported.raw,
        };
        let updated = payments::record_outcome(&mut tx, transaction.id, &outcome).await?;

        if mismatch {
            tx.commit().await?;
            error!(
                order_number = %order.number,
                expected = %order.total,
                reported = %reported.amount,
                "Payment amount does not match order total"
            );
            return Err(PaymentError::AmountMismatch {
                expected: order.total,
                reported: reported.amount,
            });
        }

        if status == PaymentStatus::Paid {
            mark_order_paid(&mut tx, &order).await?;
        } else {
            info!(order_number = %order.number, status = ?status, "Payment not completed");
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Status of the payment behind `token`, for the return page.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::UnknownToken` for a token we never issued.
    pub async fn report(&self, token: &str) -> Result<PaymentReport, PaymentError> {
        let transaction = PaymentRepository::new(self.pool)
            .get_by_token(token)
            .await?
            .ok_or(PaymentError::UnknownToken)?;
        let order = OrderRepository::new(self.pool)
            .get_by_id(transaction.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound)?;

        Ok(PaymentReport {
            order_number: order.number,
            order_status: order.status,
            payment_status: transaction.status,
            amount: transaction.amount,
        })
    }
}

/// Confirm a paid order. Money for an order that was already cancelled (its
/// reservation expired first) is recorded but needs a manual refund.
async fn mark_order_paid(
    conn: &mut sqlx::PgConnection,
    order: &Order,
) -> Result<(), PaymentError> {
    match order.status {
        OrderStatus::PendingPayment => {
            transition_locked(conn, order, OrderStatus::Paid).await?;
        }
        OrderStatus::Cancelled => {
            error!(
                order_number = %order.number,
                "Payment received for a cancelled order, refund required"
            );
        }
        other => {
            warn!(order_number = %order.number, status = %other, "Payment received for an order already past payment");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PaymentError::AmountMismatch {
            expected: Clp::new(20_960),
            reported: Clp::new(1_000),
        };
        assert_eq!(
            err.to_string(),
            "gateway reported $1.000, order total is $20.960"
        );
        assert_eq!(
            PaymentError::NotPayable(OrderStatus::Paid).to_string(),
            "order is paid and cannot be paid"
        );
    }
}
