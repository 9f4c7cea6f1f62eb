//! Payment transaction model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use andes_core::{Clp, OrderId, PaymentId, PaymentStatus};

/// A payment attempt against the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentTransaction {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub provider: String,
    pub token: Option<String>,
    pub gateway_order: Option<String>,
    pub amount: Clp,
    pub status: PaymentStatus,
    pub gateway_status: Option<i32>,
    pub payer_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
