//! Locally persisted COD orders.
//!
//! A local order is written as `pending` before any platform call so that a
//! submission is never lost, then updated with whatever the platform said.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use codform_core::customer::CustomerFields;
use codform_core::pricing::{ActiveOffer, PriceQuote};
use codform_core::shipping::ShippingRate;
use codform_core::wire::LocalOrderRef;
use codform_core::{LocalOrderId, LocalOrderStatus, OrderType, PlatformId};

/// Offset added to the row id to form the merchant-facing order number.
pub const ORDER_NUMBER_OFFSET: i32 = 1000;

/// One line of a local order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub variant_id: PlatformId,
    pub product_id: PlatformId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    /// Set on lines added after checkout by an accepted upsell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upsell_id: Option<String>,
}

/// A timestamped pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub at: DateTime<Utc>,
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Outcome of one upsell addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsellRecord {
    pub upsell_id: String,
    pub variant_id: PlatformId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount_amount: Decimal,
    pub shopify_updated: bool,
    pub at: DateTime<Utc>,
}

/// Free-form processing record stored as JSONB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderMetadata {
    pub steps: Vec<MetadataEntry>,
    pub offer: ActiveOffer,
    /// Totals the widget displayed. Kept for audit only.
    pub claimed_totals: Option<PriceQuote>,
    pub source: String,
    pub platform_response: Option<serde_json::Value>,
    pub errors: Vec<String>,
    pub upsells: Vec<UpsellRecord>,
}

impl OrderMetadata {
    pub fn record(&mut self, step: &str, detail: Option<String>) {
        self.steps.push(MetadataEntry {
            at: Utc::now(),
            step: step.to_string(),
            detail,
        });
    }

    pub fn record_error(&mut self, step: &str, error: String) {
        self.record(step, Some(error.clone()));
        self.errors.push(error);
    }

    #[must_use]
    pub fn upsell(&self, upsell_id: &str) -> Option<&UpsellRecord> {
        self.upsells.iter().find(|u| u.upsell_id == upsell_id)
    }
}

/// A persisted local order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalOrder {
    pub id: LocalOrderId,
    pub shop: String,
    pub status: LocalOrderStatus,
    pub customer: CustomerFields,
    pub shipping: Option<ShippingRate>,
    pub line_items: Vec<OrderLine>,
    pub totals: PriceQuote,
    pub client_ip: Option<String>,
    pub order_type: Option<OrderType>,
    pub platform_order_id: Option<PlatformId>,
    pub platform_order_number: Option<String>,
    pub note: Option<String>,
    pub metadata: OrderMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalOrder {
    /// Merchant-facing number, e.g. `COD-1042`.
    #[must_use]
    pub fn order_number(&self) -> String {
        format!("COD-{}", self.id.as_i32().saturating_add(ORDER_NUMBER_OFFSET))
    }

    #[must_use]
    pub fn reference(&self) -> LocalOrderRef {
        LocalOrderRef {
            id: self.id,
            order_number: self.order_number(),
            status: self.status,
        }
    }
}

/// Data required to insert a local order.
#[derive(Debug, Clone)]
pub struct NewLocalOrder {
    pub shop: String,
    pub customer: CustomerFields,
    pub shipping: Option<ShippingRate>,
    pub line_items: Vec<OrderLine>,
    pub totals: PriceQuote,
    pub client_ip: Option<String>,
    pub metadata: OrderMetadata,
}
