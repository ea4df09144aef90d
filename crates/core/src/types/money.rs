//! Decimal money helpers.
//!
//! Amounts are plain `Decimal`s in the shop currency's standard unit
//! (e.g. dollars, not cents). The currency itself is a shop setting and never
//! changes inside a single checkout, so it is not carried alongside amounts.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places kept for every computed amount.
pub const MONEY_SCALE: u32 = 2;

/// Round an amount to two decimal places, midpoint away from zero.
///
/// Applied after every discount step so the widget and the server agree to
/// the cent.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an integer amount in minor units (cents) into a decimal amount.
///
/// Shopify's storefront `.js` endpoints report prices this way.
#[must_use]
pub fn from_minor_units(cents: i64) -> Decimal {
    Decimal::new(cents, MONEY_SCALE)
}

/// Format an amount with exactly two decimal places (e.g. `"210.00"`).
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}
