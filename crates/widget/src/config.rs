//! Widget options.

use url::Url;

use crate::error::WidgetError;

/// Where the widget runs and which services it talks to.
#[derive(Debug, Clone)]
pub struct WidgetOptions {
    /// Shop domain, e.g. `demo.myshopify.com`.
    pub shop: String,
    /// Base URL of the checkout service (`/api/...` lives below it).
    pub app_base_url: Url,
    /// Base URL of the storefront (`/products/...`, `/cart/...`).
    pub storefront_base_url: Url,
}

impl WidgetOptions {
    /// Parse options from strings.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::Url`] when either URL is invalid.
    pub fn new(shop: &str, app_base_url: &str, storefront_base_url: &str) -> Result<Self, WidgetError> {
        Ok(Self {
            shop: shop.trim().to_string(),
            app_base_url: Url::parse(app_base_url)?,
            storefront_base_url: Url::parse(storefront_base_url)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_options_parse() {
        let options =
            WidgetOptions::new(" demo.myshopify.com ", "https://cod.example.com", "https://demo.myshopify.com").unwrap();
        assert_eq!(options.shop, "demo.myshopify.com");
        assert_eq!(options.app_base_url.host_str(), Some("cod.example.com"));
    }

    #[test]
    fn test_options_reject_bad_url() {
        assert!(matches!(
            WidgetOptions::new("demo", "not a url", "https://demo.myshopify.com"),
            Err(WidgetError::Url(_))
        ));
    }
}
