//! Shop session repository.

use secrecy::SecretString;
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::ShopSession;

#[derive(sqlx::FromRow)]
struct SessionRow {
    shop: String,
    access_token: String,
    scope: Option<String>,
}

impl From<SessionRow> for ShopSession {
    fn from(row: SessionRow) -> Self {
        Self {
            shop: row.shop,
            access_token: SecretString::from(row.access_token),
            scope: row.scope,
        }
    }
}

/// Repository for installed-shop credentials.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, shop: &str) -> Result<Option<ShopSession>, RepositoryError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r"
            SELECT shop, access_token, scope
            FROM codform.shop_sessions
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShopSession::from))
    }
}
