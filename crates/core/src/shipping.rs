//! Shipping rates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A shipping option the shopper can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
}

impl ShippingRate {
    /// Whether this rate costs nothing.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.price <= Decimal::ZERO
    }
}

/// Pick the rate with `id`, falling back to the first configured rate.
///
/// Exactly one rate is always selected while any exist; an unknown id (for
/// example a rate the merchant deleted since the page loaded) falls back to
/// the default.
#[must_use]
pub fn select_rate<'a>(rates: &'a [ShippingRate], id: Option<&str>) -> Option<&'a ShippingRate> {
    id.and_then(|id| rates.iter().find(|rate| rate.id == id))
        .or_else(|| rates.first())
}

/// Price of the selected rate, or zero when no rates are configured.
#[must_use]
pub fn shipping_price(rates: &[ShippingRate], id: Option<&str>) -> Decimal {
    select_rate(rates, id).map_or(Decimal::ZERO, |rate| rate.price.max(Decimal::ZERO))
}
