//! Checkout lifecycle state.
//!
//! ```text
//! Closed → Open → Validating → Submitting → Success ─┬→ UpsellOffered → Success
//!            ↑  ↘                          ↘ Blocked  │
//!            │   DownsellOffered            ↘ NetworkError (editable, retry)
//!            └──────────── close ─────────────────────┘
//! ```
//!
//! [`CheckoutState`] is a plain value. Every transition is a method that
//! checks the current phase and returns whether it applied; the engine owns
//! the network calls and the rendering around them.

use std::collections::BTreeMap;

use codform_core::customer::{CUSTOMER_KEYS, CustomerFields};
use codform_core::form::{FieldError, FormMode, SectionSettings, validate_values};
use codform_core::offers::{Downsell, OfferError, Upsell};
use codform_core::pricing::{ActiveDiscount, ActiveOffer, DiscountSource, PriceQuote, quote};
use codform_core::settings::{RedirectDescriptor, ShopSettings};
use codform_core::shipping::{select_rate, shipping_price};
use codform_core::wire::{LocalOrderRef, PlatformOrderResult, ProductSnapshot, TotalsPayload};
use rust_decimal::Decimal;

use crate::product::ProductContext;
use crate::submit::{CreatedOrder, SubmitOutcome};

/// Shown when the order request fails for any reason other than blocking.
pub const NETWORK_ERROR_MESSAGE: &str = "Something went wrong while placing your order. Please try again.";

/// Where the checkout is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckoutPhase {
    #[default]
    Closed,
    Open,
    Validating,
    Submitting,
    Success,
    Blocked,
    NetworkError,
    UpsellOffered,
    DownsellOffered,
}

impl CheckoutPhase {
    /// Whether the form itself is shown and editable.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(self, Self::Open | Self::NetworkError)
    }
}

/// The order being assembled while the form is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub product: ProductSnapshot,
    /// Quantity from the product page; a tier overrides it.
    pub base_quantity: u32,
    pub shipping_id: Option<String>,
    pub offer: ActiveOffer,
    /// Input values keyed by submission name.
    pub values: BTreeMap<String, String>,
    pub subscribe: bool,
    pub quote: PriceQuote,
}

impl OrderDraft {
    fn new(context: &ProductContext, settings: &ShopSettings, offer: ActiveOffer) -> Self {
        let subscribe = settings
            .form
            .subscribe()
            .is_some_and(|s| s.checked_by_default);
        let mut draft = Self {
            product: snapshot(context),
            base_quantity: context.quantity.max(1),
            shipping_id: select_rate(&settings.shipping, None).map(|r| r.id.clone()),
            offer,
            values: BTreeMap::new(),
            subscribe,
            quote: quote(context.unit_price(), context.quantity, &ActiveOffer::None, Decimal::ZERO),
        };
        draft.requote(settings);
        draft
    }

    /// Quantity actually ordered.
    #[must_use]
    pub fn quantity(&self) -> u32 {
        self.offer.quantity_override().unwrap_or(self.base_quantity)
    }

    /// Recompute the quote, and the display prices of a single discount.
    pub fn requote(&mut self, settings: &ShopSettings) {
        let shipping = shipping_price(&settings.shipping, self.shipping_id.as_deref());
        let quantity = self.quantity();
        if let ActiveOffer::SingleDiscount(active) = &mut self.offer {
            let subtotal = quote(self.product.price, quantity, &ActiveOffer::None, Decimal::ZERO).subtotal;
            active.reprice(subtotal);
        }
        self.quote = quote(self.product.price, quantity, &self.offer, shipping);
    }

    /// Customer fields for submission. Custom inputs are appended to the
    /// note as `key: value` lines.
    #[must_use]
    pub fn customer_fields(&self) -> CustomerFields {
        let get = |key: &str| self.values.get(key).cloned().unwrap_or_default();
        let mut note = get("note");
        for (key, value) in &self.values {
            if CUSTOMER_KEYS.contains(&key.as_str()) || value.trim().is_empty() {
                continue;
            }
            if !note.is_empty() {
                note.push('\n');
            }
            note.push_str(&format!("{key}: {}", value.trim()));
        }
        CustomerFields {
            first_name: get("firstName"),
            last_name: get("lastName"),
            phone: get("phone"),
            email: get("email"),
            address: get("address"),
            address2: get("address2"),
            city: get("city"),
            province: get("province"),
            zip: get("zip"),
            country: get("country"),
            note,
            subscribe: self.subscribe,
        }
    }

    /// Totals payload for the order request.
    #[must_use]
    pub fn totals(&self) -> TotalsPayload {
        TotalsPayload {
            quote: self.quote,
            offer: self.offer.selection(),
        }
    }
}

pub(crate) fn snapshot(context: &ProductContext) -> ProductSnapshot {
    let variant = context.variant();
    ProductSnapshot {
        id: context.product_id.clone(),
        variant_id: context.selected_variant.clone(),
        title: context.title.clone(),
        variant_title: variant
            .map(|v| v.title.clone())
            .filter(|t| !t.is_empty() && t != "Default Title"),
        handle: context.handle.clone(),
        price: context.unit_price(),
    }
}

/// An upsell on screen, with the offered product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsellOffer {
    pub upsell: Upsell,
    pub product: ProductContext,
}

/// The finished order, once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub local_order: Option<LocalOrderRef>,
    pub platform: Option<PlatformOrderResult>,
    pub redirect: RedirectDescriptor,
}

/// The whole widget state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckoutState {
    pub phase: CheckoutPhase,
    pub draft: Option<OrderDraft>,
    pub field_error: Option<FieldError>,
    /// Message above the form (network error, block message).
    pub banner: Option<String>,
    /// Short-lived notice (upsell failure).
    pub toast: Option<String>,
    pub discount_code_error: Option<String>,
    pub downsell: Option<Downsell>,
    pub downsell_shown: bool,
    pub upsell: Option<UpsellOffer>,
    pub completion: Option<Completion>,
    /// Offer kept across close/open so reopening restores it.
    remembered_offer: ActiveOffer,
}

impl CheckoutState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `Closed → Open`. Restores a previously selected offer when it still
    /// applies, otherwise the pre-selected tier of a matching quantity offer.
    pub fn open(&mut self, context: &ProductContext, settings: &ShopSettings) -> bool {
        if self.phase != CheckoutPhase::Closed {
            return false;
        }
        let offer = if self.remembered_offer.is_none() {
            settings
                .offers
                .quantity_offer_for(&context.product_id)
                .and_then(|offer| offer.preselected())
                .map_or(ActiveOffer::None, ActiveOffer::QuantityTier)
        } else {
            settings
                .offers
                .resolve(
                    &self.remembered_offer.selection(),
                    &context.product_id,
                    context.unit_price(),
                )
                .unwrap_or_default()
        };

        self.draft = Some(OrderDraft::new(context, settings, offer));
        self.phase = CheckoutPhase::Open;
        self.field_error = None;
        self.banner = None;
        self.toast = None;
        self.discount_code_error = None;
        self.completion = None;
        true
    }

    /// The product page changed variant or quantity. Returns whether the
    /// totals changed.
    pub fn product_changed(&mut self, context: &ProductContext, settings: &ShopSettings) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        if !self.phase.is_editable() && self.phase != CheckoutPhase::DownsellOffered {
            return false;
        }
        let before = draft.quote;
        draft.product = snapshot(context);
        draft.base_quantity = context.quantity.max(1);
        draft.requote(settings);
        draft.quote != before
    }

    /// Select a tier of the quantity offer targeting the product. Replaces
    /// any other offer.
    pub fn select_tier(&mut self, tier_index: usize, settings: &ShopSettings) -> bool {
        if !self.phase.is_editable() {
            return false;
        }
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        let Some(selected) = settings
            .offers
            .quantity_offer_for(&draft.product.id)
            .and_then(|offer| offer.select(tier_index))
        else {
            return false;
        };
        draft.offer = ActiveOffer::QuantityTier(selected);
        draft.requote(settings);
        self.remembered_offer = draft.offer.clone();
        self.discount_code_error = None;
        true
    }

    /// Select a shipping rate; unknown ids are ignored.
    pub fn select_shipping(&mut self, rate_id: &str, settings: &ShopSettings) -> bool {
        if !self.phase.is_editable() || !settings.shipping.iter().any(|r| r.id == rate_id) {
            return false;
        }
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        draft.shipping_id = Some(rate_id.to_string());
        draft.requote(settings);
        true
    }

    /// Apply a typed discount code.
    ///
    /// # Errors
    ///
    /// Returns [`OfferError::UnknownDiscountCode`] for unknown codes; the
    /// message from the discount-code section labels is stored for display.
    pub fn apply_discount_code(&mut self, code: &str, settings: &ShopSettings) -> Result<(), OfferError> {
        let Some(draft) = self.draft.as_mut().filter(|_| self.phase.is_editable()) else {
            return Err(OfferError::UnknownDiscountCode(code.to_string()));
        };
        let Some(dc) = settings.offers.discount_code(code, &draft.product.id) else {
            self.discount_code_error = Some(discount_code_invalid_text(settings));
            return Err(OfferError::UnknownDiscountCode(code.to_string()));
        };
        draft.offer = ActiveOffer::SingleDiscount(ActiveDiscount::new(
            DiscountSource::Code {
                code: dc.code.clone(),
            },
            dc.discount,
            draft.quote.subtotal,
        ));
        draft.requote(settings);
        self.remembered_offer = draft.offer.clone();
        self.discount_code_error = None;
        Ok(())
    }

    /// Record an input value. Clears the inline error of that field.
    pub fn set_value(&mut self, name: &str, value: &str) -> bool {
        if !self.phase.is_editable() {
            return false;
        }
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        draft.values.insert(name.to_string(), value.to_string());
        if self.field_error.as_ref().is_some_and(|e| e.name == name) {
            self.field_error = None;
        }
        true
    }

    pub fn set_subscribe(&mut self, subscribe: bool) -> bool {
        match self.draft.as_mut() {
            Some(draft) if self.phase.is_editable() => {
                draft.subscribe = subscribe;
                true
            }
            _ => false,
        }
    }

    /// `Open → Validating`, then on to `Submitting`-ready (`true`) or back to
    /// `Open` with the first field error (`false`).
    pub fn validate(&mut self, settings: &ShopSettings) -> bool {
        if !self.phase.is_editable() {
            return false;
        }
        let Some(draft) = self.draft.as_ref() else {
            return false;
        };
        self.phase = CheckoutPhase::Validating;
        match validate_values(&settings.form, |name| {
            Some(draft.values.get(name).map_or("", String::as_str))
        }) {
            Ok(()) => {
                self.field_error = None;
                true
            }
            Err(error) => {
                self.field_error = Some(error);
                self.phase = CheckoutPhase::Open;
                false
            }
        }
    }

    /// `Validating → Submitting`.
    pub fn begin_submit(&mut self) -> bool {
        if self.phase != CheckoutPhase::Validating {
            return false;
        }
        self.phase = CheckoutPhase::Submitting;
        self.banner = None;
        true
    }

    /// Leave `Submitting` according to the submission outcome.
    pub fn finish_submit(&mut self, outcome: &SubmitOutcome) -> bool {
        if self.phase != CheckoutPhase::Submitting {
            return false;
        }
        match outcome {
            SubmitOutcome::Created(created) => {
                self.completion = Some(completion(created));
                self.phase = CheckoutPhase::Success;
                self.remembered_offer = ActiveOffer::None;
            }
            SubmitOutcome::Blocked { message } => {
                self.banner = Some(message.clone());
                if let Some(draft) = self.draft.as_mut() {
                    draft.values.clear();
                }
                self.phase = CheckoutPhase::Blocked;
            }
            SubmitOutcome::Failed(_) => {
                self.banner = Some(NETWORK_ERROR_MESSAGE.to_string());
                self.phase = CheckoutPhase::NetworkError;
            }
        }
        true
    }

    /// `Success → UpsellOffered`.
    pub fn offer_upsell(&mut self, offer: UpsellOffer) -> bool {
        if self.phase != CheckoutPhase::Success || self.upsell.is_some() {
            return false;
        }
        self.upsell = Some(offer);
        self.phase = CheckoutPhase::UpsellOffered;
        true
    }

    /// Select the variant of the offered upsell product.
    pub fn select_upsell_variant(&mut self, variant_id: &codform_core::PlatformId) -> bool {
        match self.upsell.as_mut() {
            Some(offer)
                if self.phase == CheckoutPhase::UpsellOffered
                    && offer.product.variants.iter().any(|v| &v.id == variant_id) =>
            {
                offer.product.selected_variant = variant_id.clone();
                true
            }
            _ => false,
        }
    }

    /// `UpsellOffered → Success`, with an optional notice for the shopper.
    pub fn resolve_upsell(&mut self, toast: Option<String>) -> bool {
        if self.phase != CheckoutPhase::UpsellOffered {
            return false;
        }
        self.toast = toast;
        self.phase = CheckoutPhase::Success;
        true
    }

    /// Close intent. In popup mode an unseen matching downsell intercepts the
    /// first close before submission; embedded forms never close.
    pub fn request_close(&mut self, settings: &ShopSettings) -> CheckoutPhase {
        match self.phase {
            CheckoutPhase::Closed | CheckoutPhase::Validating | CheckoutPhase::Submitting => {}
            _ if settings.form.mode == FormMode::Embedded && self.phase.is_editable() => {}
            CheckoutPhase::Open | CheckoutPhase::NetworkError => {
                let downsell = self.draft.as_ref().and_then(|draft| {
                    settings.offers.downsell_for(&draft.product.id).cloned()
                });
                match downsell {
                    Some(downsell) if !self.downsell_shown => {
                        self.downsell = Some(downsell);
                        self.downsell_shown = true;
                        self.phase = CheckoutPhase::DownsellOffered;
                    }
                    _ => self.close(),
                }
            }
            CheckoutPhase::DownsellOffered => {}
            CheckoutPhase::Success | CheckoutPhase::Blocked | CheckoutPhase::UpsellOffered => {
                self.close();
            }
        }
        self.phase
    }

    /// `DownsellOffered → Open` with the downsell discount as the active
    /// offer.
    pub fn accept_downsell(&mut self, settings: &ShopSettings) -> bool {
        if self.phase != CheckoutPhase::DownsellOffered {
            return false;
        }
        let (Some(downsell), Some(draft)) = (self.downsell.take(), self.draft.as_mut()) else {
            return false;
        };
        draft.offer = ActiveOffer::SingleDiscount(ActiveDiscount::new(
            DiscountSource::Downsell {
                downsell_id: downsell.id.clone(),
            },
            downsell.discount,
            draft.quote.subtotal,
        ));
        draft.requote(settings);
        self.remembered_offer = draft.offer.clone();
        self.phase = CheckoutPhase::Open;
        true
    }

    /// `DownsellOffered → Closed`.
    pub fn decline_downsell(&mut self) -> bool {
        if self.phase != CheckoutPhase::DownsellOffered {
            return false;
        }
        self.downsell = None;
        self.close();
        true
    }

    fn close(&mut self) {
        if let Some(draft) = &self.draft
            && self.phase != CheckoutPhase::Success
            && self.phase != CheckoutPhase::UpsellOffered
        {
            self.remembered_offer = draft.offer.clone();
        }
        self.phase = CheckoutPhase::Closed;
        self.draft = None;
        self.field_error = None;
        self.banner = None;
        self.upsell = None;
        self.downsell = None;
    }
}

fn completion(created: &CreatedOrder) -> Completion {
    Completion {
        local_order: created.local_order.clone(),
        platform: created.platform.clone(),
        redirect: created.redirect.clone(),
    }
}

fn discount_code_invalid_text(settings: &ShopSettings) -> String {
    settings
        .form
        .visible_fields()
        .find_map(|field| match &field.kind {
            codform_core::form::FieldKind::Section(SectionSettings::DiscountCode(labels)) => {
                Some(labels.invalid.clone())
            }
            _ => None,
        })
        .unwrap_or_else(|| codform_core::form::DiscountCodeLabels::default().invalid)
}
