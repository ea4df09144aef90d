//! Product context detection.
//!
//! The widget only mounts on product pages. [`ProductContextDetector`] reads
//! the page URL, fetches the product from the storefront and publishes the
//! selected variant and quantity through a `watch` channel, so the engine
//! re-quotes whenever the shopper changes either.

use codform_core::{PlatformId, from_minor_units};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, instrument};
use url::Url;

use crate::api::StorefrontApi;
use crate::error::WidgetError;

/// A variant as reported by `/products/{handle}.js` (prices in cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontVariant {
    pub id: PlatformId,
    #[serde(default)]
    pub title: String,
    pub price: i64,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

/// A product as reported by `/products/{handle}.js`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontProduct {
    pub id: PlatformId,
    pub title: String,
    pub handle: String,
    #[serde(default)]
    pub variants: Vec<StorefrontVariant>,
    #[serde(default)]
    pub featured_image: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A purchasable variant with its price in the shop currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub id: PlatformId,
    pub title: String,
    pub price: Decimal,
    pub available: bool,
    pub options: Vec<String>,
}

impl From<&StorefrontVariant> for Variant {
    fn from(v: &StorefrontVariant) -> Self {
        Self {
            id: v.id.clone(),
            title: v.title.clone(),
            price: from_minor_units(v.price),
            available: v.available,
            options: v.options.clone(),
        }
    }
}

/// The product the shopper is looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductContext {
    pub product_id: PlatformId,
    pub title: String,
    pub handle: String,
    pub image: Option<String>,
    /// Variants in storefront order.
    pub variants: Vec<Variant>,
    pub selected_variant: PlatformId,
    /// Always at least 1.
    pub quantity: u32,
}

impl ProductContext {
    /// Build a context, selecting `variant` when it exists, else the first
    /// available variant, else the first variant.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::NotFound`] when the product has no variants.
    pub fn from_product(
        product: &StorefrontProduct,
        variant: Option<&PlatformId>,
    ) -> Result<Self, WidgetError> {
        let variants: Vec<Variant> = product.variants.iter().map(Variant::from).collect();
        let selected = variant
            .and_then(|id| variants.iter().find(|v| &v.id == id))
            .or_else(|| variants.iter().find(|v| v.available))
            .or_else(|| variants.first())
            .map(|v| v.id.clone())
            .ok_or_else(|| WidgetError::NotFound(format!("variants of {}", product.handle)))?;

        Ok(Self {
            product_id: product.id.clone(),
            title: product.title.clone(),
            handle: product.handle.clone(),
            image: product.featured_image.clone(),
            variants,
            selected_variant: selected,
            quantity: 1,
        })
    }

    /// The selected variant.
    #[must_use]
    pub fn variant(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == self.selected_variant)
    }

    /// Unit price of the selected variant.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.variant().map_or(Decimal::ZERO, |v| v.price)
    }

    /// Whether the product has a real variant choice.
    #[must_use]
    pub fn has_variant_choice(&self) -> bool {
        self.variants.len() > 1
    }
}

/// A product page reference parsed from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPath {
    pub handle: String,
    pub variant: Option<PlatformId>,
}

/// Parse `/products/{handle}` (optionally under a locale or collection
/// prefix, e.g. `/fr/collections/mugs/products/blue-mug`) and the
/// `?variant=` parameter.
#[must_use]
pub fn parse_product_path(url: &Url) -> Option<ProductPath> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let position = segments.iter().rposition(|s| *s == "products")?;
    let handle = segments.get(position + 1)?;
    let handle = handle.strip_suffix(".js").unwrap_or(handle);
    if handle.is_empty() {
        return None;
    }
    let variant = url
        .query_pairs()
        .find(|(key, _)| key == "variant")
        .map(|(_, value)| PlatformId::new(&value))
        .filter(|id| !id.is_empty());

    Some(ProductPath {
        handle: handle.to_string(),
        variant,
    })
}

/// Detects the product on the current page and tracks variant and quantity
/// changes.
pub struct ProductContextDetector<S> {
    storefront: S,
    tx: watch::Sender<Option<ProductContext>>,
}

impl<S: StorefrontApi> ProductContextDetector<S> {
    #[must_use]
    pub fn new(storefront: S) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { storefront, tx }
    }

    /// Change events; the value is `None` until a product was detected.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<ProductContext>> {
        self.tx.subscribe()
    }

    /// The current context, if any.
    #[must_use]
    pub fn current(&self) -> Option<ProductContext> {
        self.tx.borrow().clone()
    }

    /// Detect the product for `page_url` and publish it.
    ///
    /// # Errors
    ///
    /// Returns [`WidgetError::NotProductPage`] for non-product URLs, or the
    /// storefront error when the product cannot be fetched.
    #[instrument(skip(self), fields(url = %page_url))]
    pub async fn detect(&self, page_url: &Url) -> Result<ProductContext, WidgetError> {
        let path = parse_product_path(page_url)
            .ok_or_else(|| WidgetError::NotProductPage(page_url.path().to_string()))?;
        let product = self.storefront.fetch_product(&path.handle).await?;
        let context = ProductContext::from_product(&product, path.variant.as_ref())?;
        debug!(product_id = %context.product_id, variant_id = %context.selected_variant, "product detected");
        self.tx.send_replace(Some(context.clone()));
        Ok(context)
    }

    /// Select a variant. Unknown ids are ignored. Returns whether the
    /// selection changed.
    pub fn select_variant(&self, variant_id: &PlatformId) -> bool {
        self.tx.send_if_modified(|context| match context {
            Some(ctx) if ctx.selected_variant != *variant_id
                && ctx.variants.iter().any(|v| &v.id == variant_id) =>
            {
                ctx.selected_variant = variant_id.clone();
                true
            }
            _ => false,
        })
    }

    /// Set the quantity (clamped to at least 1). Returns whether it changed.
    pub fn set_quantity(&self, quantity: u32) -> bool {
        let quantity = quantity.max(1);
        self.tx.send_if_modified(|context| match context {
            Some(ctx) if ctx.quantity != quantity => {
                ctx.quantity = quantity;
                true
            }
            _ => false,
        })
    }

    /// Forget the product (navigation away).
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}
