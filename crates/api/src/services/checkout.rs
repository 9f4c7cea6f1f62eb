//! The checkout transaction.
//!
//! Turns the customer's cart into a `pending_payment` order. Everything runs
//! in one database transaction; any error drops it, so no reservation, order
//! row or ledger entry survives a failed checkout.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::info;

use andes_core::checkout::{
    CheckoutError, CheckoutPlan, LockedProduct, OrderTotals, plan_checkout,
};
use andes_core::shipping::{ShippingError, ShippingQuote, ShippingRequest, evaluate_shipping};
use andes_core::stock::StockError;
use andes_core::{AddressId, Email, ProductId, Rut};

use crate::db::RepositoryError;
use crate::db::inventory::{self, MovementSource};
use crate::db::orders::{self, NewOrder};
use crate::db::{addresses, carts, products, shipping};
use crate::models::{AddressInput, CurrentUser, OrderDetail, OrderItem, ShippingSnapshot};

const MAX_NOTES_LENGTH: usize = 1000;

#[derive(Debug, Error)]
pub enum CheckoutServiceError {
    #[error("{0}")]
    Checkout(#[from] CheckoutError),

    #[error("{0}")]
    Shipping(#[from] ShippingError),

    #[error("{0}")]
    Stock(#[from] StockError),

    #[error("shipping address not found")]
    AddressNotFound,

    #[error("invalid customer details: {0}")]
    InvalidCustomer(String),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(err.into())
    }
}

/// Customer contact details captured on the order.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub rut: Option<String>,
}

/// `POST /api/checkout` body.
///
/// With neither `address_id` nor `address`, the customer's default address
/// is used.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub address_id: Option<AddressId>,
    #[serde(default)]
    pub address: Option<AddressInput>,
    pub customer: CustomerInput,
    #[serde(default)]
    pub carrier_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug)]
struct Customer {
    name: String,
    email: Email,
    phone: String,
    rut: Option<Rut>,
}

impl CustomerInput {
    fn validate(&self) -> Result<Customer, CheckoutServiceError> {
        let name = self.full_name.trim();
        if name.is_empty() {
            return Err(CheckoutServiceError::InvalidCustomer(
                "full_name is required".to_string(),
            ));
        }
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Err(CheckoutServiceError::InvalidCustomer(
                "phone is required".to_string(),
            ));
        }
        let email = Email::parse(&self.email)
            .map_err(|e| CheckoutServiceError::InvalidCustomer(e.to_string()))?;
        let rut = self
            .rut
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(Rut::parse)
            .transpose()
            .map_err(|e| CheckoutServiceError::InvalidCustomer(e.to_string()))?;

        Ok(Customer {
            name: name.to_string(),
            email,
            phone: phone.to_string(),
            rut,
        })
    }
}

/// Runs checkouts.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    reservation_ttl: Duration,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, reservation_ttl: Duration) -> Self {
        Self {
            pool,
            reservation_ttl,
        }
    }

    /// Place an order from the user's cart.
    ///
    /// An inline `address` must already be normalized.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutServiceError::Checkout` for an empty cart, unavailable
    /// products or insufficient stock, `Shipping` when nothing can deliver to
    /// the address, `AddressNotFound` and `InvalidCustomer` for bad input.
    pub async fn checkout(
        &self,
        user: &CurrentUser,
        request: &CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderDetail, CheckoutServiceError> {
        let customer = request.customer.validate()?;
        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH) {
            return Err(CheckoutServiceError::InvalidCustomer(format!(
                "notes must be at most {MAX_NOTES_LENGTH} characters"
            )));
        }
        let reserved_until = now
            + chrono::Duration::from_std(self.reservation_ttl)
                .unwrap_or_else(|_| chrono::Duration::minutes(30));

        let mut tx = self.pool.begin().await?;

        let address = resolve_address(&mut tx, user, request).await?;

        let cart_id = carts::lock_user_cart(&mut tx, user.id)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;
        let lines = carts::lines(&mut tx, cart_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart.into());
        }

        // 1. Lock product rows in id order.
        let mut ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let locked = products::lock_for_update(&mut tx, &ids).await?;

        // 2. Price and stock-check against the locked rows.
        let locked: Vec<LockedProduct> = locked
            .into_iter()
            .map(|p| LockedProduct {
                id: p.id,
                sku: p.sku,
                name: p.name,
                is_active: p.is_active,
                weight_grams: p.weight_grams,
                pricing: p.pricing,
                stock: p.stock,
            })
            .collect();
        let plan = plan_checkout(&lines, &locked, now)?;

        // 3. Quote shipping against the current rules.
        let context = shipping::load_context(&mut tx).await?;
        let quote = evaluate_shipping(
            &context,
            &ShippingRequest {
                region_code: &address.region_code,
                weight_grams: plan.total_weight_grams,
                subtotal: plan.subtotal,
                carrier_code: request.carrier_code.as_deref(),
            },
        )?;

        // 4. Reserve stock.
        let movements = reserve(&mut tx, &plan, &locked).await?;

        // 5. Order header.
        let totals = OrderTotals::new(plan.subtotal, quote.cost);
        let number = orders::next_number(&mut tx, now.date_naive()).await?;
        let order = orders::insert(
            &mut tx,
            &NewOrder {
                number: &number,
                user_id: user.id,
                totals,
                notes,
                reserved_until,
            },
        )
        .await?;

        // 6. Snapshots.
        let snapshot = shipping_snapshot(&customer, &address, &quote);
        orders::insert_shipping_snapshot(&mut tx, order.id, &snapshot).await?;
        let mut items = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let id = orders::insert_item(&mut tx, order.id, line).await?;
            items.push(OrderItem {
                id,
                product_id: Some(line.product_id),
                sku: line.sku.clone(),
                name: line.name.clone(),
                quantity: line.quantity,
                list_price: line.list_price,
                unit_price: line.unit_price,
                line_total: line.line_total,
                weight_grams: line.weight_grams,
            });
        }

        // 7. Ledger.
        for (product_id, movement) in movements {
            inventory::record(
                &mut tx,
                product_id,
                movement,
                MovementSource {
                    order_id: Some(order.id),
                    actor_id: Some(user.id),
                    reason: None,
                },
            )
            .await?;
        }

        // 8. Empty the cart.
        carts::clear(&mut tx, cart_id).await?;

        tx.commit().await?;

        info!(
            order_number = %order.number,
            user_id = %user.id,
            total = %order.total,
            lines = items.len(),
            "Order placed"
        );

        Ok(OrderDetail {
            order,
            items,
            shipping: Some(snapshot),
        })
    }
}

/// Saved address, inline address, or the user's default, in that order.
async fn resolve_address(
    conn: &mut PgConnection,
    user: &CurrentUser,
    request: &CheckoutRequest,
) -> Result<AddressInput, CheckoutServiceError> {
    if let Some(address) = &request.address {
        return Ok(address.clone());
    }

    let saved = match request.address_id {
        Some(id) => addresses::find(conn, user.id, id).await?,
        None => addresses::find_default(conn, user.id).await?,
    }
    .ok_or(CheckoutServiceError::AddressNotFound)?;

    Ok(AddressInput {
        recipient: saved.recipient,
        phone: saved.phone,
        street: saved.street,
        number: saved.number,
        apartment: saved.apartment,
        commune: saved.commune,
        city: saved.city,
        region_code: saved.region_code,
    })
}

async fn reserve(
    conn: &mut PgConnection,
    plan: &CheckoutPlan,
    locked: &[LockedProduct],
) -> Result<Vec<(ProductId, andes_core::stock::Movement)>, CheckoutServiceError> {
    let mut movements = Vec::with_capacity(plan.lines.len());
    for (product_id, quantity) in plan.reservations() {
        let product = locked
            .iter()
            .find(|p| p.id == product_id)
            .ok_or(CheckoutError::ProductUnavailable(product_id))?;
        let (level, movement) = product.stock.reserve(quantity)?;
        products::write_stock(conn, product_id, level).await?;
        movements.push((product_id, movement));
    }
    Ok(movements)
}

fn shipping_snapshot(customer: &Customer, address: &AddressInput, quote: &ShippingQuote) -> ShippingSnapshot {
    ShippingSnapshot {
        customer_name: customer.name.clone(),
        customer_email: customer.email.to_string(),
        customer_phone: customer.phone.clone(),
        customer_rut: customer.rut.as_ref().map(Rut::formatted),
        recipient: address.recipient.clone(),
        phone: address.phone.clone(),
        street: address.street.clone(),
        number: address.number.clone(),
        apartment: address.apartment.clone(),
        commune: address.commune.clone(),
        city: address.city.clone(),
        region_code: address.region_code.clone(),
        carrier_id: quote.carrier_id,
        carrier_code: quote.carrier_code.clone(),
        carrier_name: quote.carrier_name.clone(),
        rule_id: quote.rule_id,
        rule_name: quote.rule_name.clone(),
        zone_name: quote.zone_name.clone(),
        shipping_cost: quote.cost,
        eta_days: quote.eta_days,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn customer() -> CustomerInput {
        CustomerInput {
            full_name: " Ana Pérez ".to_string(),
            email: "Ana@Example.cl".to_string(),
            phone: "+56 9 1234 5678".to_string(),
            rut: Some("12.345.678-5".to_string()),
        }
    }

    #[test]
    fn test_customer_is_normalized() {
        let c = customer().validate().unwrap();
        assert_eq!(c.name, "Ana Pérez");
        assert_eq!(c.email.as_str(), "ana@example.cl");
        assert!(c.rut.is_some());
    }

    #[test]
    fn test_customer_requires_fields() {
        let mut input = customer();
        input.phone = "  ".to_string();
        assert!(matches!(
            input.validate(),
            Err(CheckoutServiceError::InvalidCustomer(_))
        ));

        let mut input = customer();
        input.rut = Some("12.345.678-9".to_string());
        assert!(matches!(
            input.validate(),
            Err(CheckoutServiceError::InvalidCustomer(_))
        ));

        let mut input = customer();
        input.rut = Some("   ".to_string());
        assert!(input.validate().unwrap().rut.is_none());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "customer": {
                "full_name": "Ana",
                "email": "ana@example.cl",
                "phone": "123"
            }
        }))
        .unwrap();
        assert!(request.address_id.is_none());
        assert!(request.address.is_none());
        assert!(request.carrier_code.is_none());
    }
}
