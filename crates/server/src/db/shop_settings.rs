//! Shop settings repository.

use sqlx::PgPool;

use codform_core::settings::ShopSettings;

use super::{RepositoryError, from_json};

#[derive(sqlx::FromRow)]
struct ShopSettingsRow {
    form: serde_json::Value,
    shipping: serde_json::Value,
    offers: serde_json::Value,
    order_settings: serde_json::Value,
}

impl TryFrom<ShopSettingsRow> for ShopSettings {
    type Error = RepositoryError;

    fn try_from(row: ShopSettingsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            form: from_json("form", row.form)?,
            shipping: from_json("shipping", row.shipping)?,
            offers: from_json("offers", row.offers)?,
            order_settings: from_json("order_settings", row.order_settings)?,
        })
    }
}

/// Repository for the merchant's checkout configuration.
pub struct ShopSettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopSettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the settings for a shop. `None` when the shop never saved any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored JSON column is invalid.
    pub async fn get(&self, shop: &str) -> Result<Option<ShopSettings>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopSettingsRow>(
            r"
            SELECT form, shipping, offers, order_settings
            FROM codform.shop_settings
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .fetch_optional(self.pool)
        .await?;

        row.map(ShopSettings::try_from).transpose()
    }
}
