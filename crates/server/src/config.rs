//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CODFORM_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! ## Optional
//! - `CODFORM_HOST` - Bind address (default: 127.0.0.1)
//! - `CODFORM_PORT` - Listen port (default: 3000)
//! - `CODFORM_CONFIG_CACHE_TTL_SECS` - Shop settings cache TTL (default: 60)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2026-01)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)
//!
//! Shop access tokens are not configuration: each shop's token is read from
//! its `codform.shop_sessions` row.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// How long fetched shop settings are served from memory
    pub config_cache_ttl: Duration,
    /// Shopify Admin API settings
    pub shopify: ShopifyConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Shopify Admin API configuration.
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Admin API version (e.g., 2026-01)
    pub api_version: String,
    /// Request timeout for every platform call
    pub timeout: Duration,
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            api_version: "2026-01".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CODFORM_DATABASE_URL")?;
        let host = parse_env("CODFORM_HOST", "127.0.0.1")?;
        let port = parse_env("CODFORM_PORT", "3000")?;
        let cache_ttl_secs: u64 = parse_env("CODFORM_CONFIG_CACHE_TTL_SECS", "60")?;

        let shopify = ShopifyConfig {
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2026-01"),
            ..ShopifyConfig::default()
        };

        Ok(Self {
            database_url,
            host,
            port,
            config_cache_ttl: Duration::from_secs(cache_ttl_secs),
            shopify,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, using `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/codform"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            config_cache_ttl: Duration::from_secs(60),
            shopify: ShopifyConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_parse_value() {
        let port: u16 = parse_value("CODFORM_PORT", " 8080 ").unwrap();
        assert_eq!(port, 8080);

        let err = parse_value::<u16>("CODFORM_PORT", "eighty").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "CODFORM_PORT"));

        let rate: f32 = parse_value("SENTRY_SAMPLE_RATE", "0.25").unwrap();
        assert!((rate - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_debug_does_not_leak_database_url() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("postgres://localhost/codform"));
    }
}
