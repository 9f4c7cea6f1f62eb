//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use andes_core::pricing::Pricing;
use andes_core::stock::StockLevel;
use andes_core::{CategoryId, Clp, ProductId};

use super::RepositoryError;
use crate::models::{Pagination, Product, ProductDraft};

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    id: i32,
    category_id: Option<i32>,
    sku: String,
    slug: String,
    name: String,
    description: String,
    price: i64,
    discount_price: Option<i64>,
    discount_percent: Option<Decimal>,
    discount_starts_at: Option<DateTime<Utc>>,
    discount_ends_at: Option<DateTime<Utc>>,
    weight_grams: i32,
    stock_qty: i32,
    stock_reserved: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let stock = StockLevel::new(row.stock_qty, row.stock_reserved).map_err(|e| {
            RepositoryError::DataCorruption(format!("product {} stock: {e}", row.id))
        })?;

        Ok(Self {
            id: ProductId::new(row.id),
            category_id: row.category_id.map(CategoryId::new),
            sku: row.sku,
            slug: row.slug,
            name: row.name,
            description: row.description,
            pricing: Pricing {
                price: Clp::new(row.price),
                discount_price: row.discount_price.map(Clp::new),
                discount_percent: row.discount_percent,
                discount_starts_at: row.discount_starts_at,
                discount_ends_at: row.discount_ends_at,
            },
            weight_grams: row.weight_grams,
            stock,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(super) const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.sku, p.slug, p.name, \
    p.description, p.price, p.discount_price, p.discount_percent, p.discount_starts_at, \
    p.discount_ends_at, p.weight_grams, p.stock_qty, p.stock_reserved, p.is_active, \
    p.created_at, p.updated_at";

/// `WHERE` clause shared by the storefront list and its count.
///
/// `$1` category root (with descendants), `$2` `ILIKE` pattern, `$3` only on
/// sale, `$4` now.
const STOREFRONT_FILTER: &str = r"
    p.is_active
    AND ($1::INT IS NULL OR p.category_id IN (
        WITH RECURSIVE sub AS (
            SELECT id FROM category WHERE id = $1
            UNION ALL
            SELECT c.id FROM category c JOIN sub ON c.parent_id = sub.id
        )
        SELECT id FROM sub
    ))
    AND ($2::TEXT IS NULL OR p.name ILIKE $2 OR p.sku ILIKE $2)
    AND (NOT $3 OR (
        (p.discount_starts_at IS NULL OR p.discount_starts_at <= $4)
        AND (p.discount_ends_at IS NULL OR p.discount_ends_at > $4)
        AND (
            (p.discount_price IS NOT NULL AND p.discount_price > 0 AND p.discount_price < p.price)
            OR (p.discount_percent IS NOT NULL AND ROUND(p.price * p.discount_percent / 100) > 0)
        )
    ))
";

/// Storefront listing criteria after slugs have been resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorefrontQuery<'a> {
    pub category: Option<CategoryId>,
    pub pattern: Option<&'a str>,
    pub on_sale: bool,
}

/// Repository for product reads and admin writes.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active products for the storefront, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_storefront(
        &self,
        query: StorefrontQuery<'_>,
        now: DateTime<Utc>,
        pagination: Pagination,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM product p
            WHERE {STOREFRONT_FILTER}
            ORDER BY p.name, p.id
            LIMIT $5 OFFSET $6
            "
        ))
        .bind(query.category)
        .bind(query.pattern)
        .bind(query.on_sale)
        .bind(now)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM product p WHERE {STOREFRONT_FILTER}"
        ))
        .bind(query.category)
        .bind(query.pattern)
        .bind(query.on_sale)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        let products = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<_, _>>()?;
        Ok((products, total))
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get any product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get several products in one query, in id order. Unknown ids are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = ANY($1) ORDER BY p.id"
        ))
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get any product by its normalized SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.sku = $1"
        ))
        .bind(sku)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// All products, including inactive ones, for the admin panel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_admin(
        &self,
        pattern: Option<&str>,
        pagination: Pagination,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM product p
            WHERE $1::TEXT IS NULL OR p.name ILIKE $1 OR p.sku ILIKE $1
            ORDER BY p.updated_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product p WHERE $1::TEXT IS NULL OR p.name ILIKE $1 OR p.sku ILIKE $1",
        )
        .bind(pattern)
        .fetch_one(self.pool)
        .await?;

        let products = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<_, _>>()?;
        Ok((products, total))
    }

    /// Create a product with zero stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate SKU or slug and
    /// `RepositoryError::Invalid` for an unknown category.
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            WITH p AS (
                INSERT INTO product
                    (sku, slug, name, description, category_id, price, discount_price,
                     discount_percent, discount_starts_at, discount_ends_at, weight_grams,
                     is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING *
            )
            SELECT {PRODUCT_COLUMNS} FROM p
            "
        ))
        .bind(&draft.sku)
        .bind(&draft.slug)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.category_id)
        .bind(draft.pricing.price)
        .bind(draft.pricing.discount_price)
        .bind(draft.pricing.discount_percent)
        .bind(draft.pricing.discount_starts_at)
        .bind(draft.pricing.discount_ends_at)
        .bind(draft.weight_grams)
        .bind(draft.is_active)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Replace a product's catalog fields. Stock counters are untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            WITH p AS (
                UPDATE product SET
                    sku = $2, slug = $3, name = $4, description = $5, category_id = $6,
                    price = $7, discount_price = $8, discount_percent = $9,
                    discount_starts_at = $10, discount_ends_at = $11, weight_grams = $12,
                    is_active = $13, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {PRODUCT_COLUMNS} FROM p
            "
        ))
        .bind(id)
        .bind(&draft.sku)
        .bind(&draft.slug)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.category_id)
        .bind(draft.pricing.price)
        .bind(draft.pricing.discount_price)
        .bind(draft.pricing.discount_percent)
        .bind(draft.pricing.discount_starts_at)
        .bind(draft.pricing.discount_ends_at)
        .bind(draft.weight_grams)
        .bind(draft.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Hide a product from the storefront.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn deactivate(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            WITH p AS (
                UPDATE product SET is_active = FALSE, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {PRODUCT_COLUMNS} FROM p
            "
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}

// =============================================================================
// Transactional helpers
// =============================================================================

/// Lock product rows `FOR UPDATE`, in id order so concurrent checkouts over
/// overlapping carts always acquire locks in the same sequence.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_for_update(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        r"
        SELECT {PRODUCT_COLUMNS} FROM product p
        WHERE p.id = ANY($1)
        ORDER BY p.id
        FOR UPDATE
        "
    ))
    .bind(&raw)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(TryInto::try_into).collect()
}

/// Write new stock counters for a locked product.
///
/// # Errors
///
/// Returns `RepositoryError::Invalid` if the counters break the table's check
/// constraints.
pub async fn write_stock(
    conn: &mut PgConnection,
    id: ProductId,
    level: StockLevel,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE product SET stock_qty = $2, stock_reserved = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(level.on_hand)
    .bind(level.reserved)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
