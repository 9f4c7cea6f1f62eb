//! Read-through cache for data every storefront request needs.
//!
//! The category tree and the shipping configuration change only through the
//! admin panel, which invalidates the matching entry after each write. Entries
//! also expire after five minutes so edits made straight in the database show
//! up eventually.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use andes_core::catalog::{CategoryNode, build_tree};
use andes_core::shipping::ShippingContext;

use crate::db::{CategoryRepository, RepositoryError, ShippingRepository};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    CategoryTree,
    Shipping,
}

#[derive(Debug, Clone)]
enum CacheValue {
    CategoryTree(Arc<Vec<CategoryNode>>),
    Shipping(Arc<ShippingContext>),
}

/// Shared cache handle; clones share storage.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300))
            .build();
        Self { cache }
    }

    /// Active categories as a tree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the categories cannot be loaded.
    pub async fn category_tree(
        &self,
        pool: &PgPool,
    ) -> Result<Arc<Vec<CategoryNode>>, RepositoryError> {
        if let Some(CacheValue::CategoryTree(tree)) = self.cache.get(&CacheKey::CategoryTree).await
        {
            debug!("Cache hit for category tree");
            return Ok(tree);
        }

        let categories = CategoryRepository::new(pool).list(false).await?;
        let tree = Arc::new(build_tree(categories));
        self.cache
            .insert(CacheKey::CategoryTree, CacheValue::CategoryTree(Arc::clone(&tree)))
            .await;
        Ok(tree)
    }

    /// Zones, carriers and rules used to quote shipping.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the configuration cannot be loaded.
    pub async fn shipping_context(
        &self,
        pool: &PgPool,
    ) -> Result<Arc<ShippingContext>, RepositoryError> {
        if let Some(CacheValue::Shipping(ctx)) = self.cache.get(&CacheKey::Shipping).await {
            debug!("Cache hit for shipping context");
            return Ok(ctx);
        }

        let ctx = Arc::new(ShippingRepository::new(pool).context().await?);
        self.cache
            .insert(CacheKey::Shipping, CacheValue::Shipping(Arc::clone(&ctx)))
            .await;
        Ok(ctx)
    }

    pub async fn invalidate_categories(&self) {
        self.cache.invalidate(&CacheKey::CategoryTree).await;
    }

    pub async fn invalidate_shipping(&self) {
        self.cache.invalidate(&CacheKey::Shipping).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let cache = CatalogCache::new();
        cache
            .cache
            .insert(
                CacheKey::Shipping,
                CacheValue::Shipping(Arc::new(ShippingContext::default())),
            )
            .await;
        assert!(cache.cache.get(&CacheKey::Shipping).await.is_some());

        cache.invalidate_shipping().await;
        assert!(cache.cache.get(&CacheKey::Shipping).await.is_none());
    }
}
