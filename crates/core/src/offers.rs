//! Promotional offers: quantity tiers, upsells, downsells and discount codes.
//!
//! The catalog arrives as already-validated JSON from the configuration
//! service. Lookups here are what both the widget (which offer to show) and
//! the server (which discount to trust) rely on.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pricing::{
    ActiveDiscount, ActiveOffer, Discount, DiscountSource, MAX_QUANTITY, OfferTier, SelectedTier,
};
use crate::types::PlatformId;

/// A set of quantity tiers targeting some products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityOffer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Products the offer applies to. Empty targets every product.
    #[serde(default)]
    pub product_ids: Vec<PlatformId>,
    #[serde(default)]
    pub tiers: Vec<OfferTier>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A product offered after a successful order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upsell {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Handle of the product being offered.
    pub product_handle: String,
    /// Purchased products that trigger the upsell. Empty matches all.
    #[serde(default)]
    pub target_product_ids: Vec<PlatformId>,
    #[serde(default)]
    pub discount: Discount,
    /// Most units one acceptance may add.
    #[serde(default = "default_max_quantity")]
    pub max_quantity: u32,
    #[serde(default = "default_accept_text")]
    pub accept_text: String,
    #[serde(default = "default_decline_text")]
    pub decline_text: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A discount offered when the shopper tries to close the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Downsell {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// Products the downsell applies to. Empty matches all.
    #[serde(default)]
    pub target_product_ids: Vec<PlatformId>,
    pub discount: Discount,
    #[serde(default = "default_accept_text")]
    pub accept_text: String,
    #[serde(default = "default_decline_text")]
    pub decline_text: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A single discount code a shopper can type into the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub code: String,
    pub discount: Discount,
    /// Products the code applies to. Empty matches all.
    #[serde(default)]
    pub product_ids: Vec<PlatformId>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Every offer configured for a shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OfferCatalog {
    #[serde(default)]
    pub upsells: Vec<Upsell>,
    #[serde(default)]
    pub downsells: Vec<Downsell>,
    #[serde(default)]
    pub quantity_offers: Vec<QuantityOffer>,
    #[serde(default)]
    pub discount_codes: Vec<DiscountCode>,
}

/// The reference form of an [`ActiveOffer`], as sent over the wire.
///
/// The server never trusts discount values from the client; it resolves this
/// reference against its own catalog instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfferSelection {
    #[default]
    None,
    QuantityTier {
        #[serde(rename = "offerId")]
        offer_id: String,
        #[serde(rename = "tierIndex")]
        tier_index: usize,
    },
    DiscountCode {
        code: String,
    },
    Downsell {
        #[serde(rename = "downsellId")]
        downsell_id: String,
    },
}

/// Errors resolving an [`OfferSelection`] against a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferError {
    #[error("quantity offer {0} not found")]
    UnknownQuantityOffer(String),
    #[error("quantity offer {offer_id} has no tier {tier_index}")]
    UnknownTier { offer_id: String, tier_index: usize },
    #[error("discount code {0} is not valid")]
    UnknownDiscountCode(String),
    #[error("downsell {0} not found")]
    UnknownDownsell(String),
    #[error("offer does not apply to product {0}")]
    NotApplicable(PlatformId),
}

const fn default_max_quantity() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_accept_text() -> String {
    "Yes, add it".to_string()
}

fn default_decline_text() -> String {
    "No thanks".to_string()
}

fn targets(ids: &[PlatformId], product_id: &PlatformId) -> bool {
    ids.is_empty() || ids.contains(product_id)
}

impl QuantityOffer {
    /// Whether the offer is active and targets `product_id`.
    #[must_use]
    pub fn applies_to(&self, product_id: &PlatformId) -> bool {
        self.active && !self.tiers.is_empty() && targets(&self.product_ids, product_id)
    }

    /// Select a tier by index.
    #[must_use]
    pub fn select(&self, tier_index: usize) -> Option<SelectedTier> {
        self.tiers.get(tier_index).map(|tier| SelectedTier {
            offer_id: self.id.clone(),
            tier_index,
            tier: tier.clone(),
        })
    }

    /// The first pre-selected tier, if any.
    #[must_use]
    pub fn preselected(&self) -> Option<SelectedTier> {
        self.tiers
            .iter()
            .position(|tier| tier.preselected)
            .and_then(|index| self.select(index))
    }
}

impl Upsell {
    /// Whether the upsell is active and triggered by `product_id`.
    #[must_use]
    pub fn applies_to(&self, product_id: &PlatformId) -> bool {
        self.active && targets(&self.target_product_ids, product_id)
    }

    /// The requested quantity, kept within `1..=max_quantity`.
    #[must_use]
    pub fn capped_quantity(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_quantity.clamp(1, MAX_QUANTITY))
    }
}

impl Downsell {
    /// Whether the downsell is active and applies to `product_id`.
    #[must_use]
    pub fn applies_to(&self, product_id: &PlatformId) -> bool {
        self.active && self.discount.is_effective() && targets(&self.target_product_ids, product_id)
    }
}

impl DiscountCode {
    /// Case-insensitive code comparison, ignoring surrounding whitespace.
    #[must_use]
    pub fn matches(&self, code: &str) -> bool {
        self.active && self.code.trim().eq_ignore_ascii_case(code.trim())
    }
}

impl OfferCatalog {
    /// The quantity offer shown for a product (the first one that applies).
    #[must_use]
    pub fn quantity_offer_for(&self, product_id: &PlatformId) -> Option<&QuantityOffer> {
        self.quantity_offers
            .iter()
            .find(|offer| offer.applies_to(product_id))
    }

    /// The upsell offered after buying `product_id`.
    #[must_use]
    pub fn upsell_for(&self, product_id: &PlatformId) -> Option<&Upsell> {
        self.upsells.iter().find(|u| u.applies_to(product_id))
    }

    /// The downsell offered when abandoning the form for `product_id`.
    #[must_use]
    pub fn downsell_for(&self, product_id: &PlatformId) -> Option<&Downsell> {
        self.downsells.iter().find(|d| d.applies_to(product_id))
    }

    /// Look up an upsell by id, regardless of whether it is still active.
    #[must_use]
    pub fn upsell(&self, id: &str) -> Option<&Upsell> {
        self.upsells.iter().find(|u| u.id == id)
    }

    /// Look up a discount code valid for `product_id`.
    #[must_use]
    pub fn discount_code(&self, code: &str, product_id: &PlatformId) -> Option<&DiscountCode> {
        self.discount_codes
            .iter()
            .find(|dc| dc.matches(code) && targets(&dc.product_ids, product_id))
    }

    /// Rebuild an [`ActiveOffer`] from a wire reference, using only values
    /// held in this catalog.
    ///
    /// `subtotal` is the undiscounted merchandise amount; it only feeds the
    /// display prices of a single discount.
    ///
    /// # Errors
    ///
    /// Returns an [`OfferError`] when the reference is unknown or does not
    /// apply to `product_id`.
    pub fn resolve(
        &self,
        selection: &OfferSelection,
        product_id: &PlatformId,
        subtotal: Decimal,
    ) -> Result<ActiveOffer, OfferError> {
        match selection {
            OfferSelection::None => Ok(ActiveOffer::None),
            OfferSelection::QuantityTier {
                offer_id,
                tier_index,
            } => {
                let offer = self
                    .quantity_offers
                    .iter()
                    .find(|o| &o.id == offer_id)
                    .ok_or_else(|| OfferError::UnknownQuantityOffer(offer_id.clone()))?;
                if !offer.applies_to(product_id) {
                    return Err(OfferError::NotApplicable(product_id.clone()));
                }
                offer
                    .select(*tier_index)
                    .map(ActiveOffer::QuantityTier)
                    .ok_or_else(|| OfferError::UnknownTier {
                        offer_id: offer_id.clone(),
                        tier_index: *tier_index,
                    })
            }
            OfferSelection::DiscountCode { code } => {
                let dc = self
                    .discount_code(code, product_id)
                    .ok_or_else(|| OfferError::UnknownDiscountCode(code.clone()))?;
                Ok(ActiveOffer::SingleDiscount(ActiveDiscount::new(
                    DiscountSource::Code {
                        code: dc.code.clone(),
                    },
                    dc.discount,
                    subtotal,
                )))
            }
            OfferSelection::Downsell { downsell_id } => {
                let downsell = self
                    .downsells
                    .iter()
                    .find(|d| &d.id == downsell_id)
                    .ok_or_else(|| OfferError::UnknownDownsell(downsell_id.clone()))?;
                if !downsell.applies_to(product_id) {
                    return Err(OfferError::NotApplicable(product_id.clone()));
                }
                Ok(ActiveOffer::SingleDiscount(ActiveDiscount::new(
                    DiscountSource::Downsell {
                        downsell_id: downsell.id.clone(),
                    },
                    downsell.discount,
                    subtotal,
                )))
            }
        }
    }
}

impl ActiveOffer {
    /// The wire reference for this offer.
    #[must_use]
    pub fn selection(&self) -> OfferSelection {
        match self {
            Self::None => OfferSelection::None,
            Self::QuantityTier(selected) => OfferSelection::QuantityTier {
                offer_id: selected.offer_id.clone(),
                tier_index: selected.tier_index,
            },
            Self::SingleDiscount(active) => match &active.source {
                DiscountSource::Code { code } => OfferSelection::DiscountCode { code: code.clone() },
                DiscountSource::Downsell { downsell_id } => OfferSelection::Downsell {
                    downsell_id: downsell_id.clone(),
                },
            },
        }
    }
}
