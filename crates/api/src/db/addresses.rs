//! Address repository.
//!
//! Every write that can change which address is the default locks the owning
//! `app_user` row first, so concurrent requests cannot both create a "first"
//! address or leave a user without a default.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use andes_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    user_id: i32,
    recipient: String,
    phone: String,
    street: String,
    number: String,
    apartment: Option<String>,
    commune: String,
    city: String,
    region_code: String,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            user_id: UserId::new(row.user_id),
            recipient: row.recipient,
            phone: row.phone,
            street: row.street,
            number: row.number,
            apartment: row.apartment,
            commune: row.commune,
            city: row.city,
            region_code: row.region_code,
            is_default: row.is_default,
            created_at: row.created_at,
        }
    }
}

const ADDRESS_COLUMNS: &str = "id, user_id, recipient, phone, street, number, apartment, \
                               commune, city, region_code, is_default, created_at";

/// Repository for user shipping addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS} FROM address
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at, id
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get one of a user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find(&mut conn, user_id, id).await
    }

    /// Save a new address. A user's first address becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let has_any: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM address WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO address
                (user_id, recipient, phone, street, number, apartment, commune, city,
                 region_code, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&input.recipient)
        .bind(&input.phone)
        .bind(&input.street)
        .bind(&input.number)
        .bind(input.apartment.as_deref())
        .bind(&input.commune)
        .bind(&input.city)
        .bind(&input.region_code)
        .bind(!has_any)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Replace an address's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE address SET
                recipient = $3, phone = $4, street = $5, number = $6, apartment = $7,
                commune = $8, city = $9, region_code = $10, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(&input.recipient)
        .bind(&input.phone)
        .bind(&input.street)
        .bind(&input.number)
        .bind(input.apartment.as_deref())
        .bind(&input.commune)
        .bind(&input.city)
        .bind(&input.region_code)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete an address. If it was the default, the newest remaining address
    /// takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        let was_default: bool = sqlx::query_scalar(
            "DELETE FROM address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE address SET is_default = TRUE, updated_at = NOW()
                WHERE id = (
                    SELECT id FROM address WHERE user_id = $1
                    ORDER BY created_at DESC, id DESC LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Make an address the user's default, clearing the previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, user_id).await?;

        if find(&mut tx, user_id, id).await?.is_none() {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            "UPDATE address SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_default",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            UPDATE address SET is_default = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }
}

/// Find a user's address on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find(
    conn: &mut PgConnection,
    user_id: UserId,
    id: AddressId,
) -> Result<Option<Address>, RepositoryError> {
    let row = sqlx::query_as::<_, AddressRow>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM address WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// A user's default address on an existing connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_default(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Option<Address>, RepositoryError> {
    let row = sqlx::query_as::<_, AddressRow>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM address WHERE user_id = $1 AND is_default"
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

async fn lock_user(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("SELECT id FROM app_user WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(())
}
