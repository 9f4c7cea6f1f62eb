//! Cart repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use andes_core::checkout::{CartLine, MAX_LINE_QUANTITY};
use andes_core::{CartId, ProductId, UserId};

use super::RepositoryError;
use super::products::{PRODUCT_COLUMNS, ProductRow};
use crate::models::{CartItem, CartOwner, Product};

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    cart_id: i32,
    quantity: i32,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            cart_id: CartId::new(row.cart_id),
            quantity: row.quantity,
            product: row.product.try_into()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: i32,
    quantity: i32,
}

/// Repository for user and guest carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the owner's cart, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find(&self, owner: &CartOwner) -> Result<Option<CartId>, RepositoryError> {
        let id: Option<i32> = match owner {
            CartOwner::User(user_id) => {
                sqlx::query_scalar("SELECT id FROM cart WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(self.pool)
                    .await?
            }
            CartOwner::Guest(key) => {
                sqlx::query_scalar("SELECT id FROM cart WHERE session_key = $1")
                    .bind(key)
                    .fetch_optional(self.pool)
                    .await?
            }
        };
        Ok(id.map(CartId::new))
    }

    /// Find or create the owner's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create(&self, owner: &CartOwner) -> Result<CartId, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        get_or_create(&mut conn, owner).await
    }

    /// Cart lines joined with their products, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(&format!(
            r"
            SELECT ci.cart_id, ci.quantity, {PRODUCT_COLUMNS}
            FROM cart_item ci
            JOIN product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.added_at, ci.id
            "
        ))
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Add units to a line, capping the line at `MAX_LINE_QUANTITY`.
    ///
    /// The increment and the stock check run in one transaction. Concurrent
    /// adds to the same line queue on the line's row, so none are lost.
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is missing or
    /// inactive, and `RepositoryError::Conflict` if the line would exceed the
    /// product's available stock.
    pub async fn add_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product: Product = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = $1 AND p.is_active FOR SHARE"
        ))
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()?;

        let total: i32 = sqlx::query_scalar(
            r"
            INSERT INTO cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, LEAST($3, $4))
            ON CONFLICT (cart_id, product_id)
                DO UPDATE SET quantity = LEAST(cart_item.quantity + EXCLUDED.quantity, $4)
            RETURNING quantity
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .fetch_one(&mut *tx)
        .await?;

        let available = product.stock.available();
        if total > available {
            return Err(RepositoryError::Conflict(format!(
                "only {available} units of {} available",
                product.sku
            )));
        }

        sqlx::query("UPDATE cart SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(total)
    }

    /// Set a line's quantity, inserting the line if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the quantity is out of range.
    pub async fn upsert_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        touch(self.pool, cart_id).await
    }

    /// Remove a line. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_item WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        touch(self.pool, cart_id).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear(&mut conn, cart_id).await
    }

    /// Move a guest cart into the user's cart and delete it.
    ///
    /// Quantities for products in both carts are added, capped at the line
    /// maximum. Returns the number of lines merged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn merge_guest(
        &self,
        session_key: &str,
        user_id: UserId,
    ) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let guest: Option<i32> =
            sqlx::query_scalar("SELECT id FROM cart WHERE session_key = $1 FOR UPDATE")
                .bind(session_key)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(guest) = guest else {
            return Ok(0);
        };

        let user_cart = get_or_create(&mut tx, &CartOwner::User(user_id)).await?;

        let merged = sqlx::query(
            r"
            INSERT INTO cart_item (cart_id, product_id, quantity)
            SELECT $1, product_id, quantity FROM cart_item WHERE cart_id = $2
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = LEAST(cart_item.quantity + EXCLUDED.quantity, $3)
            ",
        )
        .bind(user_cart)
        .bind(guest)
        .bind(MAX_LINE_QUANTITY)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM cart WHERE id = $1")
            .bind(guest)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(merged)
    }

    /// Delete guest carts untouched since `before`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_guest_carts(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM cart WHERE user_id IS NULL AND updated_at < $1")
                .bind(before)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Transactional helpers
// =============================================================================

async fn get_or_create(
    conn: &mut PgConnection,
    owner: &CartOwner,
) -> Result<CartId, RepositoryError> {
    let id: i32 = match owner {
        CartOwner::User(user_id) => {
            sqlx::query_scalar(
                r"
                INSERT INTO cart (user_id) VALUES ($1)
                ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
                RETURNING id
                ",
            )
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?
        }
        CartOwner::Guest(key) => {
            sqlx::query_scalar(
                r"
                INSERT INTO cart (session_key) VALUES ($1)
                ON CONFLICT (session_key) DO UPDATE SET updated_at = NOW()
                RETURNING id
                ",
            )
            .bind(key)
            .fetch_one(&mut *conn)
            .await?
        }
    };
    Ok(CartId::new(id))
}

async fn touch(pool: &PgPool, cart_id: CartId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE cart SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Lock a user's cart row for the checkout transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_user_cart(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<CartId>, RepositoryError> {
    let id: Option<i32> = sqlx::query_scalar("SELECT id FROM cart WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id.map(CartId::new))
}

/// Raw cart lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lines(conn: &mut PgConnection, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        "SELECT product_id, quantity FROM cart_item WHERE cart_id = $1 ORDER BY product_id",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CartLine {
            product_id: ProductId::new(r.product_id),
            quantity: r.quantity,
        })
        .collect())
}

/// Remove every line of a cart.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn clear(conn: &mut PgConnection, cart_id: CartId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM cart_item WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE cart SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
