//! Order models.
//!
//! Item and shipping snapshots are written once at checkout and never
//! updated, so an order keeps showing what the customer actually bought even
//! after products, addresses or shipping rules change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use andes_core::{
    CarrierId, Clp, OrderId, OrderItemId, OrderStatus, ProductId, ShippingRuleId, UserId,
};

/// An order header.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub number: String,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub subtotal: Clp,
    pub shipping_cost: Clp,
    pub total: Clp,
    pub notes: Option<String>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line with its snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub list_price: Clp,
    pub unit_price: Clp,
    pub line_total: Clp,
    pub weight_grams: i32,
}

/// Customer, address and carrier as they were at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingSnapshot {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_rut: Option<String>,
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub number: String,
    pub apartment: Option<String>,
    pub commune: String,
    pub city: String,
    pub region_code: String,
    pub carrier_id: CarrierId,
    pub carrier_code: String,
    pub carrier_name: String,
    pub rule_id: ShippingRuleId,
    pub rule_name: String,
    pub zone_name: String,
    pub shipping_cost: Clp,
    pub eta_days: i32,
}

/// Order with lines and shipping snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub shipping: Option<ShippingSnapshot>,
}

/// Admin order listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
