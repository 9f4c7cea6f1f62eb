//! Cart models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use andes_core::{CartId, Clp, ProductId};

use super::Product;

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(andes_core::UserId),
    /// Guest carts are keyed by a random token kept in the session.
    Guest(String),
}

/// A cart line joined with its product.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub cart_id: CartId,
    pub quantity: i32,
    pub product: Product,
}

/// One priced cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Clp,
    pub list_price: Clp,
    pub line_total: Clp,
    pub available: i32,
    /// False when the product was deactivated or no longer has enough stock.
    pub purchasable: bool,
}

/// The cart as returned to the client.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: i32,
    pub subtotal: Clp,
    pub total_weight_grams: i64,
}

impl CartView {
    /// Price every line at `now`.
    #[must_use]
    pub fn price(items: &[CartItem], now: DateTime<Utc>) -> Self {
        let mut view = Self::default();
        for item in items {
            let product = &item.product;
            let unit_price = product.pricing.effective_price(now);
            let line_total = unit_price.times(item.quantity);
            let available = product.stock.available();
            view.items.push(CartItemView {
                product_id: product.id,
                sku: product.sku.clone(),
                slug: product.slug.clone(),
                name: product.name.clone(),
                quantity: item.quantity,
                unit_price,
                list_price: product.pricing.price,
                line_total,
                available,
                purchasable: product.is_active && item.quantity <= available,
            });
            view.item_count += item.quantity;
            view.subtotal = view.subtotal + line_total;
            view.total_weight_grams += i64::from(product.weight_grams) * i64::from(item.quantity);
        }
        view
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use andes_core::pricing::Pricing;
    use andes_core::stock::StockLevel;
    use chrono::TimeZone;

    use super::*;

    fn item(id: i32, price: i64, qty: i32, on_hand: i32, active: bool) -> CartItem {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        CartItem {
            cart_id: CartId::new(1),
            quantity: qty,
            product: Product {
                id: ProductId::new(id),
                category_id: None,
                sku: format!("SKU-{id}"),
                slug: format!("producto-{id}"),
                name: format!("Producto {id}"),
                description: String::new(),
                pricing: Pricing::list(Clp::new(price)),
                weight_grams: 300,
                stock: StockLevel::new(on_hand, 0).unwrap(),
                is_active: active,
                created_at: now,
                updated_at: now,
            },
        }
    }

    #[test]
    fn test_price_totals() {
        let now = Utc::now();
        let view = CartView::price(&[item(1, 1_990, 2, 10, true), item(2, 5_000, 1, 10, true)], now);
        assert_eq!(view.subtotal, Clp::new(8_980));
        assert_eq!(view.item_count, 3);
        assert_eq!(view.total_weight_grams, 900);
    }

    #[test]
    fn test_flags_unpurchasable_lines() {
        let view = CartView::price(&[item(1, 1_000, 3, 2, true), item(2, 1_000, 1, 5, false)], Utc::now());
        assert!(!view.items[0].purchasable);
        assert!(!view.items[1].purchasable);
    }
}
