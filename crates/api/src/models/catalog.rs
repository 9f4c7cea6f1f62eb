//! Catalog models: products and category inputs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use andes_core::catalog::{normalize_sku, resolve_slug};
use andes_core::pricing::Pricing;
use andes_core::stock::StockLevel;
use andes_core::{CategoryId, Clp, ProductId};

use crate::error::AppError;

/// A product row with its pricing inputs and stock counters.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub pricing: Pricing,
    pub weight_grams: i32,
    pub stock: StockLevel,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storefront view of a product, priced at request time.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: Clp,
    pub effective_price: Clp,
    pub discount_amount: Clp,
    pub on_sale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub available: i32,
    pub in_stock: bool,
    pub weight_grams: i32,
}

impl ProductView {
    #[must_use]
    pub fn at(product: &Product, now: DateTime<Utc>) -> Self {
        let on_sale = product.pricing.is_on_sale(now);
        let available = product.stock.available();
        Self {
            id: product.id,
            category_id: product.category_id,
            sku: product.sku.clone(),
            slug: product.slug.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.pricing.price,
            effective_price: product.pricing.effective_price(now),
            discount_amount: product.pricing.discount_amount(now),
            on_sale,
            sale_ends_at: product.pricing.discount_ends_at.filter(|_| on_sale),
            available,
            in_stock: available > 0,
            weight_grams: product.weight_grams,
        }
    }
}

/// Storefront product listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Category slug; includes products of every descendant category.
    pub category: Option<String>,
    /// Case-insensitive match on name or SKU.
    pub q: Option<String>,
    pub on_sale: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Admin product create/update body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub sku: String,
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub price: Clp,
    pub discount_price: Option<Clp>,
    pub discount_percent: Option<Decimal>,
    pub discount_starts_at: Option<DateTime<Utc>>,
    pub discount_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub weight_grams: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A [`ProductInput`] that passed validation.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub pricing: Pricing,
    pub weight_grams: i32,
    pub is_active: bool,
}

impl ProductInput {
    /// Normalize SKU and slug and check pricing rules.
    ///
    /// # Errors
    ///
    /// Returns catalog or pricing errors, or `BadRequest` for a blank name or
    /// negative weight.
    pub fn validate(self) -> Result<ProductDraft, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }
        if self.weight_grams < 0 {
            return Err(AppError::BadRequest(
                "weight_grams cannot be negative".to_string(),
            ));
        }
        let pricing = Pricing {
            price: self.price,
            discount_price: self.discount_price,
            discount_percent: self.discount_percent,
            discount_starts_at: self.discount_starts_at,
            discount_ends_at: self.discount_ends_at,
        };
        pricing.validate()?;

        Ok(ProductDraft {
            sku: normalize_sku(&self.sku)?,
            slug: resolve_slug(self.slug.as_deref(), &name)?,
            name,
            description: self.description.trim().to_string(),
            category_id: self.category_id,
            pricing,
            weight_grams: self.weight_grams,
            is_active: self.is_active,
        })
    }
}

/// Admin category create/update body.
///
/// On update, `parent_id` is the new parent (`null` moves to the root).
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            sku: "caf-001".to_string(),
            name: "Café de Grano".to_string(),
            slug: None,
            description: String::new(),
            category_id: None,
            price: Clp::new(8_990),
            discount_price: None,
            discount_percent: None,
            discount_starts_at: None,
            discount_ends_at: None,
            weight_grams: 500,
            is_active: true,
        }
    }

    #[test]
    fn test_validate_normalizes() {
        let draft = input().validate().unwrap();
        assert_eq!(draft.sku, "CAF-001");
        assert_eq!(draft.slug, "cafe-de-grano");
    }

    #[test]
    fn test_validate_rejects_bad_pricing() {
        let mut bad = input();
        bad.discount_price = Some(Clp::new(9_990));
        assert!(matches!(bad.validate(), Err(AppError::Pricing(_))));

        let mut bad = input();
        bad.price = Clp::ZERO;
        assert!(matches!(bad.validate(), Err(AppError::Pricing(_))));
    }

    #[test]
    fn test_validate_rejects_blank_name_and_negative_weight() {
        let mut bad = input();
        bad.name = "  ".to_string();
        assert!(matches!(bad.validate(), Err(AppError::BadRequest(_))));

        let mut bad = input();
        bad.weight_grams = -1;
        assert!(matches!(bad.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_view_prices_at_request_time() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let draft = {
            let mut i = input();
            i.discount_percent = Some(Decimal::from(10));
            i.discount_ends_at = Some(now + chrono::Duration::days(1));
            i.validate().unwrap()
        };
        let product = Product {
            id: ProductId::new(1),
            category_id: None,
            sku: draft.sku,
            slug: draft.slug,
            name: draft.name,
            description: draft.description,
            pricing: draft.pricing,
            weight_grams: draft.weight_grams,
            stock: StockLevel::new(5, 2).unwrap(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let view = ProductView::at(&product, now);
        assert_eq!(view.effective_price, Clp::new(8_091));
        assert!(view.on_sale);
        assert_eq!(view.available, 3);
        assert!(view.sale_ends_at.is_some());

        let later = ProductView::at(&product, now + chrono::Duration::days(2));
        assert!(!later.on_sale);
        assert_eq!(later.effective_price, Clp::new(8_990));
        assert_eq!(later.sale_ends_at, None);
    }
}
