//! Checkout form engine.
//!
//! Glues the pieces together: product detection, cart mirroring, the state
//! transitions, submission and upsell negotiation. Each public method is one
//! user intent; it runs the matching transition on [`CheckoutState`], does
//! whatever network work follows from it and hands the result to the
//! renderer.

use codform_core::PlatformId;
use codform_core::settings::{RedirectDescriptor, ShopSettings};
use codform_core::wire::{ConfigSnapshot, OrderRequestForm, UpsellRequest};
use codform_core::form::FormMode;
use codform_core::shipping::select_rate;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::api::{CheckoutApi, StorefrontApi};
use crate::cart::{CartLine, CartSynchronizer};
use crate::config::WidgetOptions;
use crate::error::WidgetError;
use crate::product::{ProductContext, ProductContextDetector};
use crate::render::Renderer;
use crate::state::{CheckoutPhase, CheckoutState, UpsellOffer, snapshot};
use crate::submit::{OrderSubmissionClient, SubmitFailure, SubmitOutcome};
use crate::view;

/// Shown when an accepted upsell could not be added to the order.
pub const UPSELL_FAILED_MESSAGE: &str =
    "We couldn't add this item to your order. Your original order is confirmed.";

/// A mounted checkout form.
pub struct CheckoutEngine<S, C, R> {
    options: WidgetOptions,
    settings: ShopSettings,
    page_url: Url,
    storefront: S,
    detector: ProductContextDetector<S>,
    cart: CartSynchronizer<S>,
    submitter: OrderSubmissionClient<C>,
    renderer: R,
    state: CheckoutState,
}

impl<S, C, R> CheckoutEngine<S, C, R>
where
    S: StorefrontApi + Clone,
    C: CheckoutApi,
    R: Renderer,
{
    /// Fetch the shop configuration, detect the product and render.
    ///
    /// Embedded forms open right away; popup forms render their trigger.
    ///
    /// # Errors
    ///
    /// Fails when the configuration cannot be fetched or the page is not a
    /// product page.
    #[instrument(skip_all, fields(shop = %options.shop, url = %page_url))]
    pub async fn mount(
        options: WidgetOptions,
        storefront: S,
        checkout: C,
        renderer: R,
        page_url: Url,
    ) -> Result<Self, WidgetError> {
        let settings = checkout.fetch_config(&options.shop).await?;
        if let Err(e) = settings.form.validate() {
            warn!(error = %e, "form configuration is inconsistent, rendering anyway");
        }

        let detector = ProductContextDetector::new(storefront.clone());
        detector.detect(&page_url).await?;

        let mut engine = Self {
            options,
            settings,
            page_url,
            cart: CartSynchronizer::new(storefront.clone()),
            storefront,
            detector,
            submitter: OrderSubmissionClient::new(checkout),
            renderer,
            state: CheckoutState::new(),
        };

        if engine.settings.form.mode == FormMode::Embedded {
            engine.open().await;
        } else {
            engine.render();
        }
        Ok(engine)
    }

    #[must_use]
    pub const fn state(&self) -> &CheckoutState {
        &self.state
    }

    #[must_use]
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    #[must_use]
    pub const fn settings(&self) -> &ShopSettings {
        &self.settings
    }

    /// Product-context change events.
    #[must_use]
    pub fn product_changes(&self) -> watch::Receiver<Option<ProductContext>> {
        self.detector.subscribe()
    }

    /// Where to send the shopper once everything is done.
    #[must_use]
    pub fn redirect(&self) -> Option<&RedirectDescriptor> {
        match self.state.phase {
            CheckoutPhase::Success => self.state.completion.as_ref().map(|c| &c.redirect),
            _ => None,
        }
    }

    fn render(&mut self) {
        self.renderer.render(view::build(&self.state, &self.settings));
    }

    fn patch_totals(&mut self) {
        if let Some(node) = view::totals_node(&self.state, &self.settings) {
            self.renderer.patch(node);
        }
    }

    async fn sync_cart(&self) {
        let Some(draft) = self.state.draft.as_ref() else {
            return;
        };
        let line = CartLine {
            variant_id: draft.product.variant_id.clone(),
            quantity: draft.quantity(),
        };
        if let Err(e) = self.cart.sync(line).await {
            debug!(error = %e, "cart mirror failed");
        }
    }

    /// Open the form (trigger click).
    pub async fn open(&mut self) -> bool {
        let Some(context) = self.detector.current() else {
            return false;
        };
        if !self.state.open(&context, &self.settings) {
            return false;
        }
        self.render();
        self.sync_cart().await;
        true
    }

    /// Close intent. Returns the resulting phase, which is
    /// `DownsellOffered` when a downsell intercepted the close.
    pub fn close(&mut self) -> CheckoutPhase {
        let phase = self.state.request_close(&self.settings);
        self.render();
        phase
    }

    async fn product_changed(&mut self) {
        let Some(context) = self.detector.current() else {
            return;
        };
        if self.state.product_changed(&context, &self.settings) {
            self.patch_totals();
        }
        self.sync_cart().await;
    }

    /// The product page switched variant.
    pub async fn select_variant(&mut self, variant_id: &PlatformId) -> bool {
        if !self.detector.select_variant(variant_id) {
            return false;
        }
        self.product_changed().await;
        true
    }

    /// The product page changed quantity.
    pub async fn set_quantity(&mut self, quantity: u32) -> bool {
        if !self.detector.set_quantity(quantity) {
            return false;
        }
        self.product_changed().await;
        true
    }

    pub fn set_value(&mut self, name: &str, value: &str) -> bool {
        let had_error = self.state.field_error.is_some();
        let changed = self.state.set_value(name, value);
        if changed && had_error && self.state.field_error.is_none() {
            self.render();
        }
        changed
    }

    pub fn set_subscribe(&mut self, subscribe: bool) -> bool {
        self.state.set_subscribe(subscribe)
    }

    pub async fn select_tier(&mut self, tier_index: usize) -> bool {
        if !self.state.select_tier(tier_index, &self.settings) {
            return false;
        }
        self.render();
        self.sync_cart().await;
        true
    }

    pub fn select_shipping(&mut self, rate_id: &str) -> bool {
        if !self.state.select_shipping(rate_id, &self.settings) {
            return false;
        }
        self.render();
        true
    }

    pub async fn apply_discount_code(&mut self, code: &str) -> bool {
        let applied = self.state.apply_discount_code(code, &self.settings).is_ok();
        self.render();
        if applied {
            self.sync_cart().await;
        }
        applied
    }

    pub async fn accept_downsell(&mut self) -> bool {
        if !self.state.accept_downsell(&self.settings) {
            return false;
        }
        self.render();
        self.sync_cart().await;
        true
    }

    pub fn decline_downsell(&mut self) -> bool {
        let declined = self.state.decline_downsell();
        self.render();
        declined
    }

    fn order_request(&self) -> Option<OrderRequestForm> {
        let draft = self.state.draft.as_ref()?;
        let config = ConfigSnapshot {
            mode: self.settings.form.mode,
            page_url: Some(self.page_url.to_string()),
            locale: None,
        };
        Some(OrderRequestForm::new(
            &self.options.shop,
            &draft.customer_fields(),
            &draft.product,
            select_rate(&self.settings.shipping, draft.shipping_id.as_deref()),
            &draft.totals(),
            &config,
        ))
    }

    /// Submit intent: validate, send, then negotiate an upsell on success.
    #[instrument(skip(self), fields(shop = %self.options.shop))]
    pub async fn submit(&mut self) -> CheckoutPhase {
        if self.state.phase.is_editable()
            && let Some(context) = self.detector.current()
        {
            self.state.product_changed(&context, &self.settings);
        }

        if !self.state.validate(&self.settings) {
            self.render();
            return self.state.phase;
        }
        let Some(form) = self.order_request() else {
            return self.state.phase;
        };
        self.state.begin_submit();
        self.render();

        let outcome = self.submitter.submit(&form).await;
        if outcome == SubmitOutcome::Failed(SubmitFailure::InFlight) {
            return self.state.phase;
        }
        self.state.finish_submit(&outcome);

        if self.state.phase == CheckoutPhase::Success {
            self.offer_upsell().await;
        }
        self.render();
        self.state.phase
    }

    async fn offer_upsell(&mut self) {
        let Some(product_id) = self.state.draft.as_ref().map(|d| d.product.id.clone()) else {
            return;
        };
        let Some(upsell) = self.settings.offers.upsell_for(&product_id).cloned() else {
            return;
        };
        let product = match self.storefront.fetch_product(&upsell.product_handle).await {
            Ok(product) => product,
            Err(e) => {
                warn!(error = %e, upsell_id = %upsell.id, "upsell product unavailable, skipping");
                return;
            }
        };
        match ProductContext::from_product(&product, None) {
            Ok(context) => {
                self.state.offer_upsell(UpsellOffer {
                    upsell,
                    product: context,
                });
            }
            Err(e) => warn!(error = %e, "upsell product has no variants, skipping"),
        }
    }

    pub fn select_upsell_variant(&mut self, variant_id: &PlatformId) -> bool {
        if !self.state.select_upsell_variant(variant_id) {
            return false;
        }
        self.render();
        true
    }

    /// Accept the upsell. Failure never undoes the order; the shopper gets
    /// a notice and the flow completes.
    pub async fn accept_upsell(&mut self) -> CheckoutPhase {
        let Some(offer) = self.state.upsell.clone() else {
            return self.state.phase;
        };
        if self.state.phase != CheckoutPhase::UpsellOffered {
            return self.state.phase;
        }
        let original_order_id = self
            .state
            .completion
            .as_ref()
            .and_then(|c| c.local_order.as_ref())
            .map(|o| o.id);

        let toast = match original_order_id {
            Some(original_order_id) => {
                let request = UpsellRequest {
                    shop: self.options.shop.clone(),
                    product: snapshot(&offer.product),
                    variant_id: offer.product.selected_variant.clone(),
                    quantity: 1,
                    discount: offer.upsell.discount,
                    original_order_id,
                    upsell_id: offer.upsell.id.clone(),
                };
                match self.submitter.add_upsell(&request).await {
                    Ok(response) => {
                        info!(already_applied = response.already_applied, "upsell added");
                        None
                    }
                    Err(e) => {
                        warn!(error = %e, "upsell addition failed");
                        Some(UPSELL_FAILED_MESSAGE.to_string())
                    }
                }
            }
            None => Some(UPSELL_FAILED_MESSAGE.to_string()),
        };

        self.state.resolve_upsell(toast);
        self.render();
        self.state.phase
    }

    pub fn decline_upsell(&mut self) -> CheckoutPhase {
        self.state.resolve_upsell(None);
        self.render();
        self.state.phase
    }
}
