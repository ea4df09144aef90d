//! Network seams of the widget.
//!
//! The widget talks to two services: the storefront (product data and the
//! cart) and the checkout service (configuration, orders, upsells). Both are
//! traits so the engine can run against in-memory fakes; the `Http*` types
//! are the `reqwest` implementations used in production.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use codform_core::PlatformId;
use codform_core::settings::ShopSettings;
use codform_core::wire::{OrderRequestForm, UpsellRequest};
use moka::future::Cache;
use tracing::{debug, instrument};
use url::Url;

use crate::config::WidgetOptions;
use crate::error::WidgetError;
use crate::product::StorefrontProduct;

/// Status and body of a checkout-service response, left uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Storefront endpoints the widget uses.
pub trait StorefrontApi: Send + Sync {
    /// `GET /products/{handle}.js`.
    fn fetch_product(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<StorefrontProduct, WidgetError>> + Send;

    /// `POST /cart/clear.js`.
    fn clear_cart(&self) -> impl Future<Output = Result<(), WidgetError>> + Send;

    /// `POST /cart/add.js`.
    fn add_to_cart(
        &self,
        variant_id: &PlatformId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), WidgetError>> + Send;
}

/// Checkout-service endpoints the widget uses.
pub trait CheckoutApi: Send + Sync {
    /// `GET /api/config/{shop}`.
    fn fetch_config(
        &self,
        shop: &str,
    ) -> impl Future<Output = Result<ShopSettings, WidgetError>> + Send;

    /// `POST /api/orders` (form-encoded).
    fn create_order(
        &self,
        form: &OrderRequestForm,
    ) -> impl Future<Output = Result<RawResponse, WidgetError>> + Send;

    /// `POST /api/orders/upsell` (JSON).
    fn add_upsell(
        &self,
        request: &UpsellRequest,
    ) -> impl Future<Output = Result<RawResponse, WidgetError>> + Send;
}

// =============================================================================
// HttpStorefront
// =============================================================================

/// Storefront client over `reqwest`.
///
/// Products are cached for 5 minutes; the same handle is fetched again for
/// every upsell and every page view otherwise.
#[derive(Clone)]
pub struct HttpStorefront {
    inner: Arc<HttpStorefrontInner>,
}

struct HttpStorefrontInner {
    client: reqwest::Client,
    base_url: Url,
    products: Cache<String, StorefrontProduct>,
}

impl HttpStorefront {
    #[must_use]
    pub fn new(options: &WidgetOptions) -> Self {
        let products = Cache::builder()
            .max_capacity(100)
            .time_to_live(Duration::from_secs(300))
            .build();

        Self {
            inner: Arc::new(HttpStorefrontInner {
                client: reqwest::Client::new(),
                base_url: options.storefront_base_url.clone(),
                products,
            }),
        }
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.inner.base_url.clone();
        url.set_path(path);
        url.set_query(None);
        url
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<(), WidgetError> {
        let response = self
            .inner
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WidgetError::status(status.as_u16(), &body));
        }
        Ok(())
    }
}

impl StorefrontApi for HttpStorefront {
    #[instrument(skip(self))]
    async fn fetch_product(&self, handle: &str) -> Result<StorefrontProduct, WidgetError> {
        if let Some(product) = self.inner.products.get(handle).await {
            debug!("product cache hit");
            return Ok(product);
        }

        let response = self
            .inner
            .client
            .get(self.url(&format!("/products/{handle}.js")))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(WidgetError::NotFound(format!("product {handle}")));
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(WidgetError::status(status.as_u16(), &body));
        }

        let product: StorefrontProduct = serde_json::from_str(&body)?;
        self.inner
            .products
            .insert(handle.to_string(), product.clone())
            .await;
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), WidgetError> {
        self.post_json("/cart/clear.js", &serde_json::json!({})).await
    }

    #[instrument(skip(self), fields(variant_id = %variant_id))]
    async fn add_to_cart(&self, variant_id: &PlatformId, quantity: u32) -> Result<(), WidgetError> {
        let id = variant_id
            .as_u64()
            .map_or_else(|| serde_json::json!(variant_id.as_str()), |n| serde_json::json!(n));
        self.post_json(
            "/cart/add.js",
            &serde_json::json!({ "items": [{ "id": id, "quantity": quantity }] }),
        )
        .await
    }
}

// =============================================================================
// HttpCheckoutApi
// =============================================================================

/// Checkout-service client over `reqwest`.
#[derive(Clone)]
pub struct HttpCheckoutApi {
    inner: Arc<HttpCheckoutApiInner>,
}

struct HttpCheckoutApiInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCheckoutApi {
    #[must_use]
    pub fn new(options: &WidgetOptions) -> Self {
        Self {
            inner: Arc::new(HttpCheckoutApiInner {
                client: reqwest::Client::new(),
                base_url: options.app_base_url.clone(),
            }),
        }
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.inner.base_url.clone();
        url.set_path(path);
        url
    }

    async fn raw(response: reqwest::Response) -> Result<RawResponse, WidgetError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

impl CheckoutApi for HttpCheckoutApi {
    #[instrument(skip(self))]
    async fn fetch_config(&self, shop: &str) -> Result<ShopSettings, WidgetError> {
        let response = self
            .inner
            .client
            .get(self.url(&format!("/api/config/{shop}")))
            .send()
            .await?;
        let raw = Self::raw(response).await?;
        if raw.status == 404 {
            return Err(WidgetError::NotFound(format!("configuration for {shop}")));
        }
        if !raw.is_success() {
            return Err(WidgetError::status(raw.status, &raw.body));
        }
        Ok(serde_json::from_str(&raw.body)?)
    }

    #[instrument(skip(self, form), fields(shop = %form.shop))]
    async fn create_order(&self, form: &OrderRequestForm) -> Result<RawResponse, WidgetError> {
        let response = self
            .inner
            .client
            .post(self.url("/api/orders"))
            .form(form)
            .send()
            .await?;
        Self::raw(response).await
    }

    #[instrument(skip(self, request), fields(shop = %request.shop, upsell_id = %request.upsell_id))]
    async fn add_upsell(&self, request: &UpsellRequest) -> Result<RawResponse, WidgetError> {
        let response = self
            .inner
            .client
            .post(self.url("/api/orders/upsell"))
            .json(request)
            .send()
            .await?;
        Self::raw(response).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn options() -> WidgetOptions {
        WidgetOptions::new(
            "demo.myshopify.com",
            "https://cod.example.com/base",
            "https://demo.myshopify.com/?ref=x",
        )
        .unwrap()
    }

    #[test]
    fn test_storefront_urls_are_absolute_paths() {
        let storefront = HttpStorefront::new(&options());
        assert_eq!(
            storefront.url("/products/blue mug.js").as_str(),
            "https://demo.myshopify.com/products/blue%20mug.js"
        );
    }

    #[test]
    fn test_checkout_urls() {
        let api = HttpCheckoutApi::new(&options());
        assert_eq!(
            api.url("/api/orders").as_str(),
            "https://cod.example.com/api/orders"
        );
    }

    #[test]
    fn test_raw_response_success_range() {
        let ok = RawResponse {
            status: 204,
            body: String::new(),
        };
        let err = RawResponse {
            status: 500,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!err.is_success());
    }
}
