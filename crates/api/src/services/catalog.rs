//! Category tree edits.
//!
//! Each edit runs in one transaction: the category and its new parent are
//! locked, the tree rules from `andes_core::catalog` are checked against the
//! locked rows, and descendant levels are shifted when a subtree moves.

use sqlx::{PgConnection, PgPool};

use andes_core::CategoryId;
use andes_core::catalog::{
    CatalogError, Category, category_level, resolve_slug, validate_reparent,
};

use crate::db::categories::{self, CategoryFields};
use crate::error::AppError;
use crate::models::CategoryInput;

/// Category create / update / delete.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a category under an optional parent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank name or a missing parent,
    /// `AppError::Catalog` when the tree would get too deep and
    /// `AppError::Database` (409) for a duplicate slug.
    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category, AppError> {
        let name = required_name(&input.name)?;
        let slug = resolve_slug(input.slug.as_deref(), name)?;

        let mut tx = self.pool.begin().await?;

        let parent_level = match input.parent_id {
            Some(parent_id) => Some(lock_parent(&mut tx, parent_id).await?.level),
            None => None,
        };
        let level = category_level(parent_level)?;

        let category = categories::insert(
            &mut tx,
            &CategoryFields {
                name,
                slug: &slug,
                parent_id: input.parent_id,
                level,
                position: input.position,
                is_active: input.is_active,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(category)
    }

    /// Update a category, moving its subtree when the parent changes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown category,
    /// `AppError::Catalog` for self-parenting, cycles or excessive depth.
    pub async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, AppError> {
        let name = required_name(&input.name)?;
        let slug = resolve_slug(input.slug.as_deref(), name)?;

        let mut tx = self.pool.begin().await?;

        let current = categories::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category".to_string()))?;

        if input.parent_id == Some(id) {
            return Err(CatalogError::SelfParent.into());
        }

        let depth = categories::subtree_depth(&mut tx, id).await?;
        let (new_parent, parent_ancestors) = match input.parent_id {
            Some(parent_id) => {
                let parent = lock_parent(&mut tx, parent_id).await?;
                let ancestors = categories::ancestors(&mut tx, parent_id).await?;
                (Some((parent_id, parent.level)), ancestors)
            }
            None => (None, Vec::new()),
        };
        let level = validate_reparent(id, new_parent, &parent_ancestors, depth)?;

        let updated = categories::update(
            &mut tx,
            id,
            current.level,
            &CategoryFields {
                name,
                slug: &slug,
                parent_id: input.parent_id,
                level,
                position: input.position,
                is_active: input.is_active,
            },
        )
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a category with no subcategories and no products.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or a 409 when the category is not empty.
    pub async fn delete_category(&self, id: CategoryId) -> Result<Category, AppError> {
        let mut tx = self.pool.begin().await?;

        let category = categories::lock(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Category".to_string()))?;
        categories::delete_empty(&mut tx, id).await?;

        tx.commit().await?;
        Ok(category)
    }
}

async fn lock_parent(conn: &mut PgConnection, parent_id: CategoryId) -> Result<Category, AppError> {
    categories::lock(conn, parent_id)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("parent category {parent_id} does not exist")))
}

fn required_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    Ok(name)
}
