//! Persistence seam for the order pipeline.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use sqlx::PgPool;

use codform_core::LocalOrderId;
use codform_core::blocking::BlockingSettings;
use codform_core::settings::ShopSettings;

use crate::db::{
    BlockingRepository, LocalOrderRepository, RepositoryError, SessionRepository,
    ShopSettingsRepository,
};
use crate::models::{LocalOrder, NewLocalOrder, ShopSession};

/// Everything the order pipeline reads from or writes to storage.
pub trait OrderStore: Send + Sync {
    fn shop_session(
        &self,
        shop: &str,
    ) -> impl Future<Output = Result<Option<ShopSession>, RepositoryError>> + Send;

    /// Shop settings, defaulted when the shop never saved any.
    fn shop_settings(
        &self,
        shop: &str,
    ) -> impl Future<Output = Result<ShopSettings, RepositoryError>> + Send;

    fn blocking_settings(
        &self,
        shop: &str,
    ) -> impl Future<Output = Result<Option<BlockingSettings>, RepositoryError>> + Send;

    fn count_recent_orders(
        &self,
        shop: &str,
        client_ip: Option<&str>,
        email: Option<&str>,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<i64, RepositoryError>> + Send;

    fn insert_local_order(
        &self,
        order: &NewLocalOrder,
    ) -> impl Future<Output = Result<LocalOrder, RepositoryError>> + Send;

    fn update_local_order(
        &self,
        order: &LocalOrder,
    ) -> impl Future<Output = Result<LocalOrder, RepositoryError>> + Send;

    fn local_order(
        &self,
        shop: &str,
        id: LocalOrderId,
    ) -> impl Future<Output = Result<Option<LocalOrder>, RepositoryError>> + Send;

    /// Atomically claim an upsell for an order; `false` if already claimed.
    fn claim_upsell(
        &self,
        id: LocalOrderId,
        upsell_id: &str,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    fn release_upsell(
        &self,
        id: LocalOrderId,
        upsell_id: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// `PostgreSQL`-backed store. Shop settings are cached in memory.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    settings: Cache<String, ShopSettings>,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool, settings_ttl: Duration) -> Self {
        let settings = Cache::builder()
            .max_capacity(1000)
            .time_to_live(settings_ttl)
            .build();
        Self { pool, settings }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl OrderStore for PgStore {
    async fn shop_session(&self, shop: &str) -> Result<Option<ShopSession>, RepositoryError> {
        SessionRepository::new(&self.pool).get(shop).await
    }

    async fn shop_settings(&self, shop: &str) -> Result<ShopSettings, RepositoryError> {
        if let Some(settings) = self.settings.get(shop).await {
            tracing::debug!(shop, "Cache hit for shop settings");
            return Ok(settings);
        }

        let settings = ShopSettingsRepository::new(&self.pool)
            .get(shop)
            .await?
            .unwrap_or_default();
        self.settings
            .insert(shop.to_string(), settings.clone())
            .await;
        Ok(settings)
    }

    async fn blocking_settings(
        &self,
        shop: &str,
    ) -> Result<Option<BlockingSettings>, RepositoryError> {
        BlockingRepository::new(&self.pool).get(shop).await
    }

    async fn count_recent_orders(
        &self,
        shop: &str,
        client_ip: Option<&str>,
        email: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        LocalOrderRepository::new(&self.pool)
            .count_recent(shop, client_ip, email, since)
            .await
    }

    async fn insert_local_order(&self, order: &NewLocalOrder) -> Result<LocalOrder, RepositoryError> {
        LocalOrderRepository::new(&self.pool).insert(order).await
    }

    async fn update_local_order(&self, order: &LocalOrder) -> Result<LocalOrder, RepositoryError> {
        LocalOrderRepository::new(&self.pool).update(order).await
    }

    async fn local_order(
        &self,
        shop: &str,
        id: LocalOrderId,
    ) -> Result<Option<LocalOrder>, RepositoryError> {
        LocalOrderRepository::new(&self.pool).get(shop, id).await
    }

    async fn claim_upsell(&self, id: LocalOrderId, upsell_id: &str) -> Result<bool, RepositoryError> {
        LocalOrderRepository::new(&self.pool)
            .claim_upsell(id, upsell_id)
            .await
    }

    async fn release_upsell(&self, id: LocalOrderId, upsell_id: &str) -> Result<(), RepositoryError> {
        LocalOrderRepository::new(&self.pool)
            .release_upsell(id, upsell_id)
            .await
    }
}
