//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::cache::CatalogCache;
use crate::services::payments::{GatewayClient, GatewayError};

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    gateway: Option<GatewayClient>,
    cache: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The payment gateway client is only built when the gateway is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, GatewayError> {
        let gateway = config.payment().map(GatewayClient::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gateway,
                cache: CatalogCache::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Payment gateway client, `None` when payments are disabled.
    #[must_use]
    pub fn gateway(&self) -> Option<&GatewayClient> {
        self.inner.gateway.as_ref()
    }

    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }
}
