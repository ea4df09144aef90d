//! Shopify Admin API client.
//!
//! # Architecture
//!
//! - REST endpoints for orders, draft orders, customers and variants
//! - Raw JSON GraphQL for the order-edit mutations used by upsells
//! - Access token resolved per shop from its stored session
//! - Variant prices cached in memory via `moka` (5 minute TTL)
//!
//! # Example
//!
//! ```rust,ignore
//! use codform_server::shopify::ShopifyClient;
//!
//! let client = ShopifyClient::new(&config.shopify);
//! let price = client.variant_price(&session, &variant_id).await?;
//! ```

mod admin;
pub mod types;

pub use admin::ShopifyClient;
pub use types::*;

use thiserror::Error;

/// Top-level keys of a 422 body that mean the platform rejected customer data.
const CUSTOMER_ERROR_KEYS: &[&str] = &[
    "customer",
    "email",
    "phone",
    "first_name",
    "last_name",
    "shipping_address",
    "billing_address",
    "addresses",
];

/// Errors that can occur when interacting with Shopify APIs.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// User error from mutation (e.g., invalid input).
    #[error("User error: {0}")]
    UserError(String),

    /// The REST API rejected the payload (HTTP 422).
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The access token was rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// The shop domain cannot form an API URL.
    #[error("Invalid shop domain: {0}")]
    InvalidShop(String),

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl ShopifyError {
    /// Whether the platform refused the order because of customer fields.
    #[must_use]
    pub fn rejects_customer(&self) -> bool {
        matches!(self, Self::Validation(errors) if errors.touches_customer())
    }

    /// Whether the same request could succeed later unchanged.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Field errors from a REST 422 response.
///
/// Shopify answers either `{"errors": {"field": ["message", ...]}}` or
/// `{"errors": "message"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    /// Offending field keys, as sent by Shopify (e.g. `customer.email`).
    pub fields: Vec<String>,
    /// Flattened human-readable message.
    pub message: String,
}

impl ValidationErrors {
    /// Parse a 422 body. Unknown shapes keep the raw body as the message.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return Self {
                fields: Vec::new(),
                message: body.chars().take(200).collect(),
            };
        };

        match value.get("errors") {
            Some(serde_json::Value::Object(map)) => {
                let fields = map.keys().cloned().collect();
                let message = map
                    .iter()
                    .map(|(field, messages)| format!("{field}: {}", flatten_messages(messages)))
                    .collect::<Vec<_>>()
                    .join("; ");
                Self { fields, message }
            }
            Some(other) => Self {
                fields: Vec::new(),
                message: flatten_messages(other),
            },
            None => Self {
                fields: Vec::new(),
                message: body.chars().take(200).collect(),
            },
        }
    }

    /// Whether any offending key names a customer or address field.
    #[must_use]
    pub fn touches_customer(&self) -> bool {
        self.fields.iter().any(|field| {
            let root = field
                .split(['.', '['])
                .next()
                .unwrap_or(field)
                .to_ascii_lowercase();
            CUSTOMER_ERROR_KEYS.contains(&root.as_str())
        })
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            f.write_str("(no error details provided)")
        } else {
            f.write_str(&self.message)
        }
    }
}

fn flatten_messages(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(flatten_messages)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// A GraphQL error returned by the Shopify API.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GraphQLError {
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Path to the error in the response.
    #[serde(default)]
    pub path: Vec<serde_json::Value>,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_error_formatting() {
        let errors = vec![
            GraphQLError {
                message: "Field not found".to_string(),
                path: vec![],
            },
            GraphQLError {
                message: String::new(),
                path: vec![
                    serde_json::Value::String("orderEditBegin".to_string()),
                    serde_json::Value::Number(0.into()),
                ],
            },
        ];
        let err = ShopifyError::GraphQL(errors);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field not found; path: orderEditBegin.0"
        );
        assert_eq!(
            ShopifyError::GraphQL(vec![]).to_string(),
            "GraphQL errors: (no error details provided)"
        );
    }

    #[test]
    fn test_validation_errors_keyed_body() {
        let errors = ValidationErrors::from_body(
            r#"{"errors":{"customer.email":["is invalid"],"line_items":["must exist"]}}"#,
        );
        assert_eq!(errors.fields.len(), 2);
        assert!(errors.message.contains("customer.email: is invalid"));
        assert!(errors.touches_customer());
    }

    #[test]
    fn test_validation_errors_not_customer() {
        let errors = ValidationErrors::from_body(r#"{"errors":{"line_items":["must exist"]}}"#);
        assert!(!errors.touches_customer());
        assert!(!ShopifyError::Validation(errors).rejects_customer());
    }

    #[test]
    fn test_validation_errors_phone_and_address_keys() {
        for key in ["phone", "shipping_address.zip", "addresses[0].phone", "Email"] {
            let errors = ValidationErrors::from_body(&format!(r#"{{"errors":{{"{key}":["bad"]}}}}"#));
            assert!(errors.touches_customer(), "{key}");
        }
    }

    #[test]
    fn test_validation_errors_plain_message() {
        let errors = ValidationErrors::from_body(r#"{"errors":"Not allowed"}"#);
        assert!(errors.fields.is_empty());
        assert_eq!(errors.to_string(), "Not allowed");
        assert!(!errors.touches_customer());

        let errors = ValidationErrors::from_body("<html>oops</html>");
        assert_eq!(errors.message, "<html>oops</html>");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ShopifyError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
        assert!(err.is_transient());
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            ShopifyError::UnexpectedStatus {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !ShopifyError::UnexpectedStatus {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!ShopifyError::Unauthorized.is_transient());
        assert!(!ShopifyError::Validation(ValidationErrors::default()).is_transient());
    }
}
