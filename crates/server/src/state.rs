//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::PgStore;
use crate::shopify::ShopifyClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: PgStore,
    shopify: ShopifyClient,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let shopify = ShopifyClient::new(&config.shopify);
        let store = PgStore::new(pool, config.config_cache_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                shopify,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Order store backed by the connection pool.
    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.store.pool()
    }

    /// Get a reference to the Shopify Admin API client.
    #[must_use]
    pub fn shopify(&self) -> &ShopifyClient {
        &self.inner.shopify
    }
}
