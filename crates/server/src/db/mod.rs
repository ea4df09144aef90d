//! Database operations for the order service `PostgreSQL`.
//!
//! # Schema: `codform`
//!
//! ## Tables
//!
//! - `shop_sessions` - Admin API access tokens per installed shop
//! - `shop_settings` - Form, shipping, offers and order settings (JSONB)
//! - `blocking_settings` - Block lists and rate-limit policy (JSONB)
//! - `local_orders` - Every accepted COD submission
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p codform-cli -- migrate
//! ```

pub mod blocking;
pub mod local_orders;
pub mod sessions;
pub mod shop_settings;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use blocking::BlockingRepository;
pub use local_orders::LocalOrderRepository;
pub use sessions::SessionRepository;
pub use shop_settings::ShopSettingsRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Decode a JSONB column, reporting malformed content as corruption.
pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    column: &str,
    value: serde_json::Value,
) -> Result<T, RepositoryError> {
    serde_json::from_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} in database: {e}")))
}

/// Encode a value for a JSONB column.
pub(crate) fn to_json<T: serde::Serialize>(
    column: &str,
    value: &T,
) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("cannot encode {column}: {e}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_reports_corruption() {
        let err = from_json::<Vec<String>>("line_items", serde_json::json!({"a": 1})).unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(msg) if msg.contains("line_items")));
    }
}
