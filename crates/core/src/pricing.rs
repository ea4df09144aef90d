//! Offer pricing calculator.
//!
//! One pure function, [`quote`], turns a unit price, a quantity, the active
//! offer and a shipping price into a [`PriceQuote`]. The widget calls it for
//! live totals and the server calls it again with prices it looked up itself.
//!
//! # Rules
//!
//! - `base = unit_price × quantity`
//! - a selected quantity tier overrides the quantity with the tier quantity
//! - `PERCENTAGE` keeps `base × (1 − value/100)`, `FIXED_AMOUNT` keeps
//!   `base − value`, both floored at zero
//! - a single discount (code or downsell) applies on top of whatever the
//!   tier left, and the discount amount accumulates both reductions
//! - shipping is added last and is never discounted
//! - unit price and shipping are clamped to `[0, MAX_UNIT_PRICE]` and the
//!   quantity to `[1, MAX_QUANTITY]`, so no input can overflow
//!
//! # Example
//!
//! ```
//! use codform_core::pricing::{quote, ActiveOffer};
//! use rust_decimal::Decimal;
//!
//! let q = quote(Decimal::new(100, 0), 2, &ActiveOffer::None, Decimal::new(10, 0));
//! assert_eq!(q.subtotal, Decimal::new(200, 0));
//! assert_eq!(q.discount_amount, Decimal::ZERO);
//! assert_eq!(q.total, Decimal::new(210, 0));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::round_money;

/// Largest unit price (and shipping price) the calculator accepts.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest quantity the calculator accepts for one line.
pub const MAX_QUANTITY: u32 = 10_000;

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// Value is a percentage in `[0, 100]`.
    Percentage,
    /// Value is an amount in the shop currency.
    FixedAmount,
    /// No reduction.
    #[default]
    None,
}

/// A discount descriptor: a type and a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    #[serde(rename = "type", default)]
    pub kind: DiscountType,
    #[serde(default)]
    pub value: Decimal,
}

impl Discount {
    /// A discount that leaves every amount unchanged.
    pub const NONE: Self = Self {
        kind: DiscountType::None,
        value: Decimal::ZERO,
    };

    /// Percentage discount.
    #[must_use]
    pub const fn percentage(value: Decimal) -> Self {
        Self {
            kind: DiscountType::Percentage,
            value,
        }
    }

    /// Fixed-amount discount.
    #[must_use]
    pub const fn fixed(value: Decimal) -> Self {
        Self {
            kind: DiscountType::FixedAmount,
            value,
        }
    }

    /// Whether applying this discount can change an amount.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        !matches!(self.kind, DiscountType::None) && self.value > Decimal::ZERO
    }

    /// Apply the discount to `amount` and return what remains to be paid.
    ///
    /// Percentages clamp to `[0, 100]`, negative fixed values count as zero,
    /// and the result never drops below zero.
    #[must_use]
    pub fn apply(&self, amount: Decimal) -> Decimal {
        let amount = amount.max(Decimal::ZERO);
        let discounted = match self.kind {
            DiscountType::Percentage => {
                let pct = self.value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
                amount * (Decimal::ONE - pct / Decimal::ONE_HUNDRED)
            }
            DiscountType::FixedAmount => amount - self.value.max(Decimal::ZERO),
            DiscountType::None => amount,
        };
        round_money(discounted.max(Decimal::ZERO))
    }
}

/// One "buy N at discount D" step of a quantity offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferTier {
    /// Quantity the shopper buys when selecting this tier (at least 1).
    pub quantity: u32,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount_value: Decimal,
    /// Label shown on the tier card, e.g. "Buy 3, save 20%".
    #[serde(default)]
    pub text: String,
    /// Whether this tier is selected when the form opens.
    #[serde(default)]
    pub preselected: bool,
}

impl OfferTier {
    /// The tier's discount descriptor.
    #[must_use]
    pub const fn discount(&self) -> Discount {
        Discount {
            kind: self.discount_type,
            value: self.discount_value,
        }
    }

    /// Quantity the tier enforces, never below 1.
    #[must_use]
    pub fn effective_quantity(&self) -> u32 {
        self.quantity.max(1)
    }
}

/// Where a single discount came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DiscountSource {
    /// A code the shopper typed into the discount-code section.
    Code { code: String },
    /// A downsell offer the shopper accepted while trying to leave.
    Downsell {
        #[serde(rename = "downsellId")]
        downsell_id: String,
    },
}

/// A single discount currently applied to the draft.
///
/// `original_price` and `new_price` are display values for the subtotal the
/// discount was last applied to; prices are always recomputed from
/// `discount`, never from the stored `new_price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDiscount {
    #[serde(flatten)]
    pub source: DiscountSource,
    pub discount: Discount,
    pub original_price: Decimal,
    pub new_price: Decimal,
}

impl ActiveDiscount {
    /// Create an active discount priced against `original_price`.
    #[must_use]
    pub fn new(source: DiscountSource, discount: Discount, original_price: Decimal) -> Self {
        Self {
            source,
            discount,
            original_price,
            new_price: discount.apply(original_price),
        }
    }

    /// Re-price the display values against a new subtotal.
    pub fn reprice(&mut self, original_price: Decimal) {
        self.original_price = original_price;
        self.new_price = self.discount.apply(original_price);
    }
}

/// A quantity tier the shopper selected, with a reference back to its offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedTier {
    pub offer_id: String,
    pub tier_index: usize,
    pub tier: OfferTier,
}

/// The single promotional offer applied to a draft.
///
/// A tagged union instead of two nullable fields: a tier and a single
/// discount are never active together. Selecting one replaces the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActiveOffer {
    #[default]
    None,
    QuantityTier(SelectedTier),
    SingleDiscount(ActiveDiscount),
}

impl ActiveOffer {
    /// The quantity the offer forces, if any.
    #[must_use]
    pub fn quantity_override(&self) -> Option<u32> {
        match self {
            Self::QuantityTier(selected) => Some(selected.tier.effective_quantity()),
            Self::None | Self::SingleDiscount(_) => None,
        }
    }

    /// Whether any offer is active.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// The result of pricing a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Quantity actually charged (tier quantity when a tier is active).
    pub quantity: u32,
    pub unit_price: Decimal,
    /// `unit_price × quantity`, before any discount.
    pub subtotal: Decimal,
    /// Sum of every reduction applied to the subtotal.
    pub discount_amount: Decimal,
    pub shipping: Decimal,
    /// `subtotal − discount_amount + shipping`.
    pub total: Decimal,
}

impl PriceQuote {
    /// The discounted merchandise amount, without shipping.
    #[must_use]
    pub fn merchandise_total(&self) -> Decimal {
        self.subtotal - self.discount_amount
    }
}

/// Layered pricing input: an optional tier step and an optional single
/// discount step applied on top of it.
#[derive(Debug, Clone, Copy)]
pub struct PricingInput<'a> {
    pub unit_price: Decimal,
    pub quantity: u32,
    pub tier: Option<&'a OfferTier>,
    pub single_discount: Option<&'a Discount>,
    pub shipping: Decimal,
}

/// Price a layered input.
///
/// [`quote`] is the entry point for an [`ActiveOffer`]; this function exists
/// so both layers can be exercised together.
#[must_use]
pub fn compute(input: &PricingInput<'_>) -> PriceQuote {
    let unit_price = round_money(input.unit_price.clamp(Decimal::ZERO, MAX_UNIT_PRICE));
    let quantity = input
        .tier
        .map_or(input.quantity, OfferTier::effective_quantity)
        .clamp(1, MAX_QUANTITY);
    let subtotal = round_money(
        unit_price
            .checked_mul(Decimal::from(quantity))
            .unwrap_or(Decimal::MAX),
    );

    let after_tier = input
        .tier
        .map_or(subtotal, |tier| tier.discount().apply(subtotal));
    let after_single = input
        .single_discount
        .map_or(after_tier, |discount| discount.apply(after_tier));

    let discount_amount = subtotal - after_single;
    let shipping = round_money(input.shipping.clamp(Decimal::ZERO, MAX_UNIT_PRICE));

    PriceQuote {
        quantity,
        unit_price,
        subtotal,
        discount_amount,
        shipping,
        total: after_single + shipping,
    }
}

/// Price `quantity` units at `unit_price` under `offer`, plus `shipping`.
#[must_use]
pub fn quote(
    unit_price: Decimal,
    quantity: u32,
    offer: &ActiveOffer,
    shipping: Decimal,
) -> PriceQuote {
    let (tier, single_discount) = match offer {
        ActiveOffer::None => (None, None),
        ActiveOffer::QuantityTier(selected) => (Some(&selected.tier), None),
        ActiveOffer::SingleDiscount(active) => (None, Some(&active.discount)),
    };

    compute(&PricingInput {
        unit_price,
        quantity,
        tier,
        single_discount,
        shipping,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn tier(quantity: u32, kind: DiscountType, value: &str) -> ActiveOffer {
        ActiveOffer::QuantityTier(SelectedTier {
            offer_id: "offer-1".to_string(),
            tier_index: 0,
            tier: OfferTier {
                quantity,
                discount_type: kind,
                discount_value: dec(value),
                text: String::new(),
                preselected: false,
            },
        })
    }

    #[test]
    fn test_extreme_inputs_are_clamped() {
        let q = quote(Decimal::MAX, u32::MAX, &ActiveOffer::None, Decimal::MAX);
        assert_eq!(q.unit_price, MAX_UNIT_PRICE);
        assert_eq!(q.quantity, MAX_QUANTITY);
        assert_eq!(q.subtotal, MAX_UNIT_PRICE * Decimal::from(MAX_QUANTITY));
        assert_eq!(q.total, q.subtotal + MAX_UNIT_PRICE);

        let offer = tier(u32::MAX, DiscountType::Percentage, "10");
        let tiered = quote(Decimal::MAX, 1, &offer, Decimal::ZERO);
        assert_eq!(tiered.quantity, MAX_QUANTITY);
        assert!(tiered.total < tiered.subtotal);
    }

    #[test]
    fn test_no_offer_with_shipping() {
        let q = quote(dec("100.00"), 2, &ActiveOffer::None, dec("10.00"));
        assert_eq!(q.quantity, 2);
        assert_eq!(q.subtotal, dec("200.00"));
        assert_eq!(q.discount_amount, dec("0.00"));
        assert_eq!(q.total, dec("210.00"));
    }

    #[test]
    fn test_percentage_tier_overrides_quantity() {
        let offer = tier(3, DiscountType::Percentage, "20");
        let q = quote(dec("100.00"), 1, &offer, Decimal::ZERO);
        assert_eq!(q.quantity, 3);
        assert_eq!(q.subtotal, dec("300.00"));
        assert_eq!(q.discount_amount, dec("60.00"));
        assert_eq!(q.total, dec("240.00"));

        let with_shipping = quote(dec("100.00"), 1, &offer, dec("7.50"));
        assert_eq!(with_shipping.total, dec("247.50"));
    }

    #[test]
    fn test_fixed_tier_never_negative() {
        let offer = tier(2, DiscountType::FixedAmount, "500");
        let q = quote(dec("30.00"), 1, &offer, dec("5.00"));
        assert_eq!(q.subtotal, dec("60.00"));
        assert_eq!(q.discount_amount, dec("60.00"));
        assert_eq!(q.total, dec("5.00"));
    }

    #[test]
    fn test_percentage_property_over_grid() {
        let shipping = dec("4.99");
        for price in ["0", "0.01", "9.99", "100", "1234.56"] {
            for quantity in [1_u32, 2, 7] {
                for pct in ["0", "12.5", "50", "100"] {
                    let p = dec(price);
                    let d = dec(pct);
                    let q = compute(&PricingInput {
                        unit_price: p,
                        quantity,
                        tier: None,
                        single_discount: Some(&Discount::percentage(d)),
                        shipping,
                    });
                    let expected = round_money(
                        (p * Decimal::from(quantity) * (Decimal::ONE - d / Decimal::ONE_HUNDRED))
                            .max(Decimal::ZERO),
                    ) + shipping;
                    assert_eq!(q.total, expected, "p={price} q={quantity} d={pct}");
                    assert!(q.discount_amount >= Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn test_fixed_property_over_grid() {
        let shipping = dec("10");
        for price in ["0", "3.50", "100"] {
            for quantity in [1_u32, 3] {
                for fixed in ["0", "5", "10.50", "1000"] {
                    let p = dec(price);
                    let d = dec(fixed);
                    let q = compute(&PricingInput {
                        unit_price: p,
                        quantity,
                        tier: None,
                        single_discount: Some(&Discount::fixed(d)),
                        shipping,
                    });
                    let expected = (p * Decimal::from(quantity) - d).max(Decimal::ZERO) + shipping;
                    assert_eq!(q.total, expected);
                    assert!(q.total >= shipping);
                }
            }
        }
    }

    #[test]
    fn test_percentage_clamped() {
        assert_eq!(Discount::percentage(dec("150")).apply(dec("80")), Decimal::ZERO);
        assert_eq!(Discount::percentage(dec("-10")).apply(dec("80")), dec("80"));
        assert_eq!(Discount::fixed(dec("-10")).apply(dec("80")), dec("80"));
    }

    #[test]
    fn test_single_discount_applies_after_tier() {
        let t = OfferTier {
            quantity: 2,
            discount_type: DiscountType::Percentage,
            discount_value: dec("10"),
            text: String::new(),
            preselected: false,
        };
        let q = compute(&PricingInput {
            unit_price: dec("50"),
            quantity: 1,
            tier: Some(&t),
            single_discount: Some(&Discount::fixed(dec("15"))),
            shipping: dec("5"),
        });
        // 100 -> 90 after tier -> 75 after code
        assert_eq!(q.subtotal, dec("100"));
        assert_eq!(q.discount_amount, dec("25"));
        assert_eq!(q.total, dec("80"));
    }

    #[test]
    fn test_single_discount_offer() {
        let offer = ActiveOffer::SingleDiscount(ActiveDiscount::new(
            DiscountSource::Code {
                code: "WELCOME10".to_string(),
            },
            Discount::percentage(dec("10")),
            dec("200"),
        ));
        let q = quote(dec("100"), 2, &offer, Decimal::ZERO);
        assert_eq!(q.discount_amount, dec("20.00"));
        assert_eq!(q.total, dec("180.00"));
        assert_eq!(offer.quantity_override(), None);
    }

    #[test]
    fn test_active_discount_reprice() {
        let mut active = ActiveDiscount::new(
            DiscountSource::Downsell {
                downsell_id: "d1".to_string(),
            },
            Discount::fixed(dec("5")),
            dec("20"),
        );
        assert_eq!(active.new_price, dec("15"));
        active.reprice(dec("40"));
        assert_eq!(active.original_price, dec("40"));
        assert_eq!(active.new_price, dec("35"));
    }

    #[test]
    fn test_zero_quantity_treated_as_one() {
        let q = quote(dec("12"), 0, &ActiveOffer::None, Decimal::ZERO);
        assert_eq!(q.quantity, 1);
        assert_eq!(q.total, dec("12"));
    }

    #[test]
    fn test_active_offer_serde_tagged() {
        let offer = tier(3, DiscountType::Percentage, "20");
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["kind"], "quantity_tier");
        assert_eq!(json["tier"]["discountType"], "PERCENTAGE");
        let back: ActiveOffer = serde_json::from_value(json).unwrap();
        assert_eq!(back, offer);
    }
}
