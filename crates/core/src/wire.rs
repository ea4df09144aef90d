//! Request and response bodies shared by the widget and the server.
//!
//! The order endpoint takes a flat form-encoded body in which the product,
//! shipping, totals and configuration snapshots travel as JSON strings. The
//! widget fills an [`OrderRequestForm`]; the server decodes the same struct.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::customer::CustomerFields;
use crate::form::{FieldError, FormMode};
use crate::offers::OfferSelection;
use crate::pricing::{Discount, MAX_QUANTITY, MAX_UNIT_PRICE, PriceQuote};
use crate::settings::RedirectDescriptor;
use crate::shipping::ShippingRate;
use crate::types::{LocalOrderId, LocalOrderStatus, OrderType, PlatformId};

/// `error` value of a blocked order response.
pub const ORDER_BLOCKED: &str = "order_blocked";

/// `error` value of a response rejecting one of the customer fields.
pub const INVALID_FIELD: &str = "invalid_field";

/// Errors decoding the JSON parts of an order request.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("missing {0} payload")]
    Missing(&'static str),
    #[error("invalid {field} payload: {source}")]
    InvalidJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

/// The product and variant being ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: PlatformId,
    pub variant_id: PlatformId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    #[serde(default)]
    pub handle: String,
    /// Unit price as displayed to the shopper. Informational only.
    #[serde(default)]
    pub price: Decimal,
}

/// Totals the widget displayed, plus a reference to the active offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsPayload {
    #[serde(flatten)]
    pub quote: PriceQuote,
    #[serde(default)]
    pub offer: OfferSelection,
}

/// What the widget knew about the form when it submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigSnapshot {
    pub mode: FormMode,
    pub page_url: Option<String>,
    pub locale: Option<String>,
}

impl ConfigSnapshot {
    /// Human-readable submission source for audit notes.
    #[must_use]
    pub fn source(&self) -> String {
        let mode = match self.mode {
            FormMode::Popup => "popup form",
            FormMode::Embedded => "embedded form",
        };
        match self.page_url.as_deref() {
            Some(url) if !url.trim().is_empty() => format!("{mode} on {}", url.trim()),
            _ => mode.to_string(),
        }
    }
}

fn default_quantity() -> u32 {
    1
}

fn form_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    ))
}

/// Form-encoded body of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestForm {
    pub shop: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub note: String,
    #[serde(default, deserialize_with = "form_bool")]
    pub subscribe: bool,
    /// JSON-encoded [`ProductSnapshot`].
    #[serde(default)]
    pub product: String,
    /// JSON-encoded [`ShippingRate`].
    #[serde(default)]
    pub shipping: String,
    /// JSON-encoded [`TotalsPayload`].
    #[serde(default)]
    pub totals: String,
    /// JSON-encoded [`ConfigSnapshot`].
    #[serde(default)]
    pub config: String,
    #[serde(default)]
    pub variant_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn decode<T: serde::de::DeserializeOwned>(
    field: &'static str,
    raw: &str,
) -> Result<Option<T>, WireError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|source| WireError::InvalidJson { field, source })
}

fn encode<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

impl OrderRequestForm {
    /// Build a request from the widget's draft.
    #[must_use]
    pub fn new(
        shop: &str,
        customer: &CustomerFields,
        product: &ProductSnapshot,
        shipping: Option<&ShippingRate>,
        totals: &TotalsPayload,
        config: &ConfigSnapshot,
    ) -> Self {
        Self {
            shop: shop.to_string(),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            phone: customer.phone.clone(),
            email: customer.email.clone(),
            address: customer.address.clone(),
            address2: customer.address2.clone(),
            city: customer.city.clone(),
            province: customer.province.clone(),
            zip: customer.zip.clone(),
            country: customer.country.clone(),
            note: customer.note.clone(),
            subscribe: customer.subscribe,
            product: encode(product),
            shipping: shipping.map(encode).unwrap_or_default(),
            totals: encode(totals),
            config: encode(config),
            variant_id: product.variant_id.to_string(),
            quantity: totals.quote.quantity,
        }
    }

    /// The customer fields, as submitted.
    #[must_use]
    pub fn customer(&self) -> CustomerFields {
        CustomerFields {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
            address2: self.address2.clone(),
            city: self.city.clone(),
            province: self.province.clone(),
            zip: self.zip.clone(),
            country: self.country.clone(),
            note: self.note.clone(),
            subscribe: self.subscribe,
        }
    }

    /// Decode the product snapshot. The top-level `variantId`, when present,
    /// wins over the one inside the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] when the payload is missing or malformed.
    pub fn product(&self) -> Result<ProductSnapshot, WireError> {
        let mut product: ProductSnapshot =
            decode("product", &self.product)?.ok_or(WireError::Missing("product"))?;
        let variant_id = PlatformId::new(&self.variant_id);
        if !variant_id.is_empty() {
            product.variant_id = variant_id;
        }
        if product.price.is_sign_negative() || product.price > MAX_UNIT_PRICE {
            return Err(WireError::OutOfRange {
                field: "price",
                value: product.price.to_string(),
            });
        }
        Ok(product)
    }

    /// The submitted quantity. Zero counts as one.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::OutOfRange`] above [`MAX_QUANTITY`].
    pub fn quantity(&self) -> Result<u32, WireError> {
        if self.quantity > MAX_QUANTITY {
            return Err(WireError::OutOfRange {
                field: "quantity",
                value: self.quantity.to_string(),
            });
        }
        Ok(self.quantity.max(1))
    }

    /// Decode the selected shipping rate, if any.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] when the payload is malformed.
    pub fn shipping(&self) -> Result<Option<ShippingRate>, WireError> {
        decode("shipping", &self.shipping)
    }

    /// Decode the displayed totals, if any.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] when the payload is malformed.
    pub fn totals(&self) -> Result<Option<TotalsPayload>, WireError> {
        decode("totals", &self.totals)
    }

    /// Decode the configuration snapshot, defaulting when absent.
    ///
    /// # Errors
    ///
    /// Returns [`WireError`] when the payload is malformed.
    pub fn config(&self) -> Result<ConfigSnapshot, WireError> {
        Ok(decode("config", &self.config)?.unwrap_or_default())
    }
}

/// Reference to the persisted local order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalOrderRef {
    pub id: LocalOrderId,
    pub order_number: String,
    pub status: LocalOrderStatus,
}

/// Outcome of the platform order call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOrderResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_type: Option<OrderType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<PlatformId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationState {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStatus {
    pub status: IntegrationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntegrationStatus {
    #[must_use]
    pub const fn success() -> Self {
        Self {
            status: IntegrationState::Success,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: IntegrationState::Failed,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub const fn skipped() -> Self {
        Self {
            status: IntegrationState::Skipped,
            error: None,
        }
    }
}

/// Per-integration breakdown of an order submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integrations {
    pub shopify: IntegrationStatus,
    pub spreadsheet: IntegrationStatus,
}

/// Body of every `POST /api/orders` response.
///
/// A blocked order is `success: true` with `error: "order_blocked"`: it is
/// not a failure from the shopper's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Input name of the rejected field, with `error: "invalid_field"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_order: Option<LocalOrderRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shopify: Option<PlatformOrderResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrations: Option<Integrations>,
}

impl OrderResponse {
    /// Response for a submission stopped by the blocking policy.
    #[must_use]
    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            success: true,
            error: Some(ORDER_BLOCKED.to_string()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Response for a request that could not be processed at all.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Response for a customer field the form settings reject.
    #[must_use]
    pub fn invalid_field(error: &FieldError) -> Self {
        Self {
            success: false,
            error: Some(INVALID_FIELD.to_string()),
            message: Some(error.message.clone()),
            field: Some(error.name.clone()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.error.as_deref() == Some(ORDER_BLOCKED)
    }
}

/// JSON body of `POST /api/orders/upsell`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsellRequest {
    pub shop: String,
    pub product: ProductSnapshot,
    pub variant_id: PlatformId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// The discount the widget displayed. The server uses its own copy.
    #[serde(default)]
    pub discount: Discount,
    pub original_order_id: LocalOrderId,
    pub upsell_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpsellResponse {
    pub success: bool,
    pub shopify_updated: bool,
    pub already_applied: bool,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pricing::{ActiveOffer, quote};

    fn product() -> ProductSnapshot {
        ProductSnapshot {
            id: PlatformId::new("100"),
            variant_id: PlatformId::new("200"),
            title: "Mug".to_string(),
            variant_title: Some("Blue".to_string()),
            handle: "mug".to_string(),
            price: Decimal::new(1999, 2),
        }
    }

    fn request() -> OrderRequestForm {
        let totals = TotalsPayload {
            quote: quote(Decimal::new(1999, 2), 2, &ActiveOffer::None, Decimal::ZERO),
            offer: OfferSelection::None,
        };
        OrderRequestForm::new(
            "demo.myshopify.com",
            &CustomerFields {
                first_name: "Ada".to_string(),
                subscribe: true,
                ..Default::default()
            },
            &product(),
            None,
            &totals,
            &ConfigSnapshot::default(),
        )
    }

    #[test]
    fn test_request_decodes_snapshots() {
        let form = request();
        assert_eq!(form.quantity, 2);
        assert_eq!(form.variant_id, "200");
        assert_eq!(form.product().unwrap(), product());
        assert_eq!(form.shipping().unwrap(), None);
        assert_eq!(form.totals().unwrap().unwrap().quote.subtotal, Decimal::new(3998, 2));
        assert_eq!(form.config().unwrap().mode, FormMode::Popup);
        assert!(form.customer().subscribe);
    }

    #[test]
    fn test_top_level_variant_wins() {
        let mut form = request();
        form.variant_id = "gid://shopify/ProductVariant/201".to_string();
        assert_eq!(form.product().unwrap().variant_id.as_str(), "201");
    }

    #[test]
    fn test_missing_and_invalid_product() {
        let mut form = request();
        form.product = String::new();
        assert!(matches!(form.product(), Err(WireError::Missing("product"))));
        form.product = "{not json".to_string();
        assert!(matches!(
            form.product(),
            Err(WireError::InvalidJson { field: "product", .. })
        ));
    }

    #[test]
    fn test_price_and_quantity_bounds() {
        let mut form = request();
        form.product = encode(&ProductSnapshot {
            price: Decimal::MAX,
            ..product()
        });
        assert!(matches!(
            form.product(),
            Err(WireError::OutOfRange { field: "price", .. })
        ));
        form.product = encode(&ProductSnapshot {
            price: Decimal::new(-1, 0),
            ..product()
        });
        assert!(form.product().is_err());

        form.quantity = 0;
        assert_eq!(form.quantity().unwrap(), 1);
        form.quantity = MAX_QUANTITY;
        assert_eq!(form.quantity().unwrap(), MAX_QUANTITY);
        form.quantity = MAX_QUANTITY + 1;
        assert!(matches!(
            form.quantity(),
            Err(WireError::OutOfRange { field: "quantity", .. })
        ));
    }

    #[test]
    fn test_invalid_field_response_shape() {
        let error = FieldError {
            name: "phone".to_string(),
            message: "Phone is required".to_string(),
        };
        let json = serde_json::to_value(OrderResponse::invalid_field(&error)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "error": "invalid_field",
                "message": "Phone is required",
                "field": "phone"
            })
        );
    }

    #[test]
    fn test_subscribe_accepts_checkbox_values() {
        #[derive(Deserialize)]
        struct Checkbox {
            #[serde(deserialize_with = "form_bool")]
            value: bool,
        }
        for (raw, expected) in [("on", true), ("TRUE", true), ("1", true), ("false", false), ("", false)] {
            let checkbox: Checkbox =
                serde_json::from_value(serde_json::json!({ "value": raw })).unwrap();
            assert_eq!(checkbox.value, expected, "{raw}");
        }
    }

    #[test]
    fn test_blocked_response_shape() {
        let json = serde_json::to_value(OrderResponse::blocked("Nope")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "error": "order_blocked", "message": "Nope"})
        );
        let back: OrderResponse = serde_json::from_value(json).unwrap();
        assert!(back.is_blocked());
    }

    #[test]
    fn test_totals_payload_flattens_quote() {
        let totals = TotalsPayload {
            quote: quote(Decimal::new(10, 0), 1, &ActiveOffer::None, Decimal::new(2, 0)),
            offer: OfferSelection::DiscountCode {
                code: "X".to_string(),
            },
        };
        let json = serde_json::to_value(&totals).unwrap();
        let total: Decimal = json["total"].as_str().unwrap().parse().unwrap();
        assert_eq!(total, Decimal::new(12, 0));
        assert_eq!(json["offer"]["kind"], "discount_code");
    }

    #[test]
    fn test_upsell_request_from_json() {
        let req: UpsellRequest = serde_json::from_value(serde_json::json!({
            "shop": "demo.myshopify.com",
            "product": {"id": 5, "variantId": 6, "title": "Socks"},
            "variantId": "6",
            "discount": {"type": "PERCENTAGE", "value": "10"},
            "originalOrderId": 42,
            "upsellId": "u1"
        }))
        .unwrap();
        assert_eq!(req.quantity, 1);
        assert_eq!(req.original_order_id, LocalOrderId::new(42));
    }
}
