//! Category repository.
//!
//! Read queries go through [`CategoryRepository`]. Tree edits need several
//! statements under one lock, so they are free functions taking a connection
//! that the catalog service runs inside its own transaction.

use sqlx::{PgConnection, PgPool};

use andes_core::CategoryId;
use andes_core::catalog::Category;

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    parent_id: Option<i32>,
    name: String,
    slug: String,
    level: i16,
    position: i32,
    is_active: bool,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            parent_id: row.parent_id.map(CategoryId::new),
            name: row.name,
            slug: row.slug,
            level: row.level,
            position: row.position,
            is_active: row.is_active,
        }
    }
}

const CATEGORY_COLUMNS: &str = "id, parent_id, name, slug, level, position, is_active";

/// Repository for category reads.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List categories, optionally including inactive ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            r"
            SELECT {CATEGORY_COLUMNS} FROM category
            WHERE $1 OR is_active
            ORDER BY level, position, name
            "
        ))
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get an active category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE slug = $1 AND is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a category by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

// =============================================================================
// Transactional helpers
// =============================================================================

/// Lock a category row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(
    conn: &mut PgConnection,
    id: CategoryId,
) -> Result<Option<Category>, RepositoryError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM category WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Into::into))
}

/// Ids from `id`'s parent up to its root.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn ancestors(
    conn: &mut PgConnection,
    id: CategoryId,
) -> Result<Vec<CategoryId>, RepositoryError> {
    let ids: Vec<i32> = sqlx::query_scalar(
        r"
        WITH RECURSIVE up AS (
            SELECT parent_id, 1 AS depth FROM category WHERE id = $1
            UNION ALL
            SELECT c.parent_id, up.depth + 1
            FROM category c JOIN up ON c.id = up.parent_id
            WHERE up.depth < 16
        )
        SELECT parent_id FROM up WHERE parent_id IS NOT NULL ORDER BY depth
        ",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids.into_iter().map(CategoryId::new).collect())
}

/// How many levels hang below `id` (0 for a leaf).
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn subtree_depth(conn: &mut PgConnection, id: CategoryId) -> Result<i16, RepositoryError> {
    let depth: i32 = sqlx::query_scalar(
        r"
        WITH RECURSIVE down AS (
            SELECT id, 0 AS depth FROM category WHERE id = $1
            UNION ALL
            SELECT c.id, down.depth + 1
            FROM category c JOIN down ON c.parent_id = down.id
            WHERE down.depth < 16
        )
        SELECT COALESCE(MAX(depth), 0) FROM down
        ",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    i16::try_from(depth)
        .map_err(|_| RepositoryError::DataCorruption(format!("category depth {depth}")))
}

/// Fields written by [`insert`] and [`update`].
#[derive(Debug, Clone)]
pub struct CategoryFields<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub parent_id: Option<CategoryId>,
    pub level: i16,
    pub position: i32,
    pub is_active: bool,
}

/// Insert a category.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the slug is taken.
pub async fn insert(
    conn: &mut PgConnection,
    fields: &CategoryFields<'_>,
) -> Result<Category, RepositoryError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        r"
        INSERT INTO category (name, slug, parent_id, level, position, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {CATEGORY_COLUMNS}
        "
    ))
    .bind(fields.name)
    .bind(fields.slug)
    .bind(fields.parent_id)
    .bind(fields.level)
    .bind(fields.position)
    .bind(fields.is_active)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Update a category and shift its descendants' levels by the same amount
/// its own level moved.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the category does not exist.
pub async fn update(
    conn: &mut PgConnection,
    id: CategoryId,
    previous_level: i16,
    fields: &CategoryFields<'_>,
) -> Result<Category, RepositoryError> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!(
        r"
        UPDATE category SET
            name = $2, slug = $3, parent_id = $4, level = $5, position = $6,
            is_active = $7, updated_at = NOW()
        WHERE id = $1
        RETURNING {CATEGORY_COLUMNS}
        "
    ))
    .bind(id)
    .bind(fields.name)
    .bind(fields.slug)
    .bind(fields.parent_id)
    .bind(fields.level)
    .bind(fields.position)
    .bind(fields.is_active)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    let delta = fields.level - previous_level;
    if delta != 0 {
        sqlx::query(
            r"
            WITH RECURSIVE down AS (
                SELECT id FROM category WHERE parent_id = $1
                UNION ALL
                SELECT c.id FROM category c JOIN down ON c.parent_id = down.id
            )
            UPDATE category SET level = level + $2, updated_at = NOW()
            WHERE id IN (SELECT id FROM down)
            ",
        )
        .bind(id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;
    }

    Ok(row.into())
}

/// Delete a category that has no subcategories and no products.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the category is not empty and
/// `RepositoryError::NotFound` if it does not exist.
pub async fn delete_empty(conn: &mut PgConnection, id: CategoryId) -> Result<(), RepositoryError> {
    let (children, products): (i64, i64) = sqlx::query_as(
        r"
        SELECT (SELECT COUNT(*) FROM category WHERE parent_id = $1),
               (SELECT COUNT(*) FROM product WHERE category_id = $1)
        ",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    if children > 0 {
        return Err(RepositoryError::Conflict(
            "category still has subcategories".to_string(),
        ));
    }
    if products > 0 {
        return Err(RepositoryError::Conflict(
            "category still has products".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM category WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
