//! Blocking settings repository.

use sqlx::PgPool;

use codform_core::blocking::BlockingSettings;

use super::{RepositoryError, from_json};

/// Repository for per-shop blocking policy.
pub struct BlockingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BlockingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the blocking settings for a shop. `None` when the shop never saved any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored JSON is invalid.
    pub async fn get(&self, shop: &str) -> Result<Option<BlockingSettings>, RepositoryError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r"
            SELECT settings
            FROM codform.blocking_settings
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .fetch_optional(self.pool)
        .await?;

        row.map(|(settings,)| from_json("blocking settings", settings))
            .transpose()
    }
}
