//! Widget error types.

use thiserror::Error;

/// Errors talking to the storefront or the checkout service.
#[derive(Debug, Error)]
pub enum WidgetError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The current page is not a product page.
    #[error("not a product page: {0}")]
    NotProductPage(String),
}

impl WidgetError {
    /// Status-code error with the body truncated for logging.
    #[must_use]
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: body.chars().take(200).collect(),
        }
    }
}
