//! Checkout planning.
//!
//! [`plan_checkout`] is the decision half of the checkout transaction: given the
//! cart and the product rows locked for update, it prices every line and checks
//! stock. The caller applies the resulting reservations inside the same
//! transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::Pricing;
use crate::stock::StockLevel;
use crate::{Clp, ProductId};

/// Most units of a single product allowed on one order.
pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("quantity for product {product_id} must be between 1 and {MAX_LINE_QUANTITY}, got {quantity}")]
    InvalidQuantity { product_id: ProductId, quantity: i32 },
    #[error("product {0} is no longer available")]
    ProductUnavailable(ProductId),
    #[error("product {product_id} has {available} units available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },
}

/// A cart line as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A product row as read under `FOR UPDATE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedProduct {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub is_active: bool,
    pub weight_grams: i32,
    pub pricing: Pricing,
    pub stock: StockLevel,
}

/// A priced order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedLine {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    /// Price charged per unit.
    pub unit_price: Clp,
    /// List price per unit at checkout time.
    pub list_price: Clp,
    pub line_total: Clp,
    /// Weight per unit.
    pub weight_grams: i32,
}

/// Result of [`plan_checkout`]. Lines are ordered by product id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutPlan {
    pub lines: Vec<PlannedLine>,
    pub subtotal: Clp,
    pub total_weight_grams: i64,
}

impl CheckoutPlan {
    /// Units to move into `stock_reserved`, one entry per product.
    pub fn reservations(&self) -> impl Iterator<Item = (ProductId, i32)> + '_ {
        self.lines.iter().map(|l| (l.product_id, l.quantity))
    }
}

/// Merge lines for the same product, ordered by product id.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] for no lines and
/// [`CheckoutError::InvalidQuantity`] when a line, before or after merging,
/// falls outside `1..=MAX_LINE_QUANTITY`.
pub fn merge_lines(lines: &[CartLine]) -> Result<Vec<CartLine>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut merged: BTreeMap<ProductId, i32> = BTreeMap::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        let qty = merged.entry(line.product_id).or_insert(0);
        *qty = qty.saturating_add(line.quantity);
    }

    merged
        .into_iter()
        .map(|(product_id, quantity)| {
            if quantity > MAX_LINE_QUANTITY {
                return Err(CheckoutError::InvalidQuantity {
                    product_id,
                    quantity,
                });
            }
            Ok(CartLine {
                product_id,
                quantity,
            })
        })
        .collect()
}

/// Price and stock-check a cart against locked product rows.
///
/// Lines for the same product are merged before checking.
///
/// # Errors
///
/// Returns the first [`CheckoutError`] encountered, in product id order.
pub fn plan_checkout(
    lines: &[CartLine],
    products: &[LockedProduct],
    now: DateTime<Utc>,
) -> Result<CheckoutPlan, CheckoutError> {
    let merged = merge_lines(lines)?;

    let mut planned = Vec::with_capacity(merged.len());
    let mut subtotal = Clp::ZERO;
    let mut total_weight_grams: i64 = 0;

    for CartLine {
        product_id,
        quantity,
    } in merged
    {
        let product = products
            .iter()
            .find(|p| p.id == product_id && p.is_active)
            .ok_or(CheckoutError::ProductUnavailable(product_id))?;

        let available = product.stock.available();
        if quantity > available {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                requested: quantity,
                available,
            });
        }

        let unit_price = product.pricing.effective_price(now);
        let line_total = unit_price.times(quantity);
        subtotal = subtotal + line_total;
        total_weight_grams += i64::from(product.weight_grams) * i64::from(quantity);

        planned.push(PlannedLine {
            product_id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity,
            unit_price,
            list_price: product.pricing.price,
            line_total,
            weight_grams: product.weight_grams,
        });
    }

    Ok(CheckoutPlan {
        lines: planned,
        subtotal,
        total_weight_grams,
    })
}

/// Money summary stored on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Clp,
    pub shipping: Clp,
    pub total: Clp,
}

impl OrderTotals {
    #[must_use]
    pub fn new(subtotal: Clp, shipping: Clp) -> Self {
        Self {
            subtotal,
            shipping,
            total: subtotal + shipping,
        }
    }
}

/// Human-facing order number, `AM-YYYYMMDD-NNNNNN`.
///
/// ```
/// use andes_core::checkout::order_number;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
/// assert_eq!(order_number(date, 42), "AM-20240307-000042");
/// ```
#[must_use]
pub fn order_number(date: NaiveDate, seq: i64) -> String {
    format!("AM-{}-{seq:06}", date.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 2, 10, 0, 0).unwrap()
    }

    fn product(id: i32, price: i64, on_hand: i32, reserved: i32) -> LockedProduct {
        LockedProduct {
            id: ProductId::new(id),
            sku: format!("SKU-{id}"),
            name: format!("Producto {id}"),
            is_active: true,
            weight_grams: 250,
            pricing: Pricing::list(Clp::new(price)),
            stock: StockLevel::new(on_hand, reserved).unwrap(),
        }
    }

    fn line(id: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_empty_cart() {
        assert_eq!(
            plan_checkout(&[], &[product(1, 1_000, 5, 0)], now()),
            Err(CheckoutError::EmptyCart)
        );
    }

    #[test]
    fn test_prices_lines_and_totals() {
        let mut discounted = product(2, 10_000, 10, 0);
        discounted.pricing.discount_percent = Some(Decimal::from(20));
        let plan = plan_checkout(
            &[line(2, 1), line(1, 3)],
            &[product(1, 2_990, 10, 0), discounted],
            now(),
        )
        .unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].product_id, ProductId::new(1));
        assert_eq!(plan.lines[0].line_total, Clp::new(8_970));
        assert_eq!(plan.lines[1].unit_price, Clp::new(8_000));
        assert_eq!(plan.lines[1].list_price, Clp::new(10_000));
        assert_eq!(plan.subtotal, Clp::new(16_970));
        assert_eq!(plan.total_weight_grams, 1_000);
    }

    #[test]
    fn test_duplicate_lines_are_merged() {
        let plan = plan_checkout(
            &[line(1, 2), line(1, 3)],
            &[product(1, 1_000, 5, 0)],
            now(),
        )
        .unwrap();
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].quantity, 5);
        assert_eq!(
            plan.reservations().collect::<Vec<_>>(),
            vec![(ProductId::new(1), 5)]
        );
    }

    #[test]
    fn test_quantity_bounds() {
        let products = [product(1, 1_000, 500, 0)];
        assert!(matches!(
            plan_checkout(&[line(1, 0)], &products, now()),
            Err(CheckoutError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            plan_checkout(&[line(1, 60), line(1, 40)], &products, now()),
            Err(CheckoutError::InvalidQuantity { quantity: 100, .. })
        ));
        assert!(plan_checkout(&[line(1, 99)], &products, now()).is_ok());
    }

    #[test]
    fn test_merge_lines() {
        assert_eq!(
            merge_lines(&[line(3, 1), line(1, 2), line(3, 4)]).unwrap(),
            vec![line(1, 2), line(3, 5)]
        );
        assert_eq!(merge_lines(&[]), Err(CheckoutError::EmptyCart));
        assert_eq!(
            merge_lines(&[line(2, -1)]),
            Err(CheckoutError::InvalidQuantity {
                product_id: ProductId::new(2),
                quantity: -1,
            })
        );
        assert_eq!(
            merge_lines(&[line(1, 1), line(2, 50), line(2, 50)]),
            Err(CheckoutError::InvalidQuantity {
                product_id: ProductId::new(2),
                quantity: 100,
            })
        );
        assert_eq!(
            merge_lines(&[line(1, i32::MAX), line(1, i32::MAX)]),
            Err(CheckoutError::InvalidQuantity {
                product_id: ProductId::new(1),
                quantity: i32::MAX,
            })
        );
    }

    #[test]
    fn test_unavailable_products() {
        let mut inactive = product(1, 1_000, 5, 0);
        inactive.is_active = false;
        assert_eq!(
            plan_checkout(&[line(1, 1)], &[inactive], now()),
            Err(CheckoutError::ProductUnavailable(ProductId::new(1)))
        );
        assert_eq!(
            plan_checkout(&[line(9, 1)], &[product(1, 1_000, 5, 0)], now()),
            Err(CheckoutError::ProductUnavailable(ProductId::new(9)))
        );
    }

    #[test]
    fn test_reserved_units_are_not_available() {
        assert_eq!(
            plan_checkout(&[line(1, 3)], &[product(1, 1_000, 5, 3)], now()),
            Err(CheckoutError::InsufficientStock {
                product_id: ProductId::new(1),
                requested: 3,
                available: 2,
            })
        );
    }

    #[test]
    fn test_order_totals() {
        let totals = OrderTotals::new(Clp::new(16_970), Clp::new(3_990));
        assert_eq!(totals.total, Clp::new(20_960));
    }

    #[test]
    fn test_order_number_padding() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(order_number(date, 1), "AM-20250131-000001");
        assert_eq!(order_number(date, 1_234_567), "AM-20250131-1234567");
    }
}
