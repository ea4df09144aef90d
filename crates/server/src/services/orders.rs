//! Order synthesis pipeline.
//!
//! A submission goes through these steps:
//!
//! 1. decode the form, check fields against the shop's form settings and
//!    normalize customer fields
//! 2. run the shop's blocking policy (blocked submissions stop here)
//! 3. price with server-held offers and shipping, then persist a `pending`
//!    local order with those totals
//! 4. re-price from the platform variant price
//! 5. create the platform order or draft, retrying once without a customer
//!    when the platform rejects customer fields
//! 6. write the outcome back to the local order
//!
//! The totals the widget displayed are kept in metadata and never charged.
//! Platform failures never fail the request: the local order keeps the error
//! and the response reports each integration separately. A failed price
//! lookup leaves the order `pending`; an unknown variant marks it `failed`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use codform_core::customer::CustomerFields;
use codform_core::form::validate_values;
use codform_core::note::{AuditNote, order_summary};
use codform_core::offers::OfferSelection;
use codform_core::pricing::{ActiveOffer, DiscountSource, PriceQuote, quote};
use codform_core::settings::ShopSettings;
use codform_core::shipping::{ShippingRate, select_rate};
use codform_core::wire::{
    IntegrationStatus, Integrations, OrderRequestForm, OrderResponse, PlatformOrderResult,
    ProductSnapshot, WireError,
};
use codform_core::LocalOrderStatus;

use super::blocking::{self, BlockDecision};
use super::platform::CommercePlatform;
use super::store::OrderStore;
use crate::db::RepositoryError;
use crate::models::{LocalOrder, NewLocalOrder, OrderLine, OrderMetadata, ShopSession};
use crate::shopify::{
    CreatedPlatformOrder, CustomerInput, NewOrder, NewOrderLine, OrderDiscount, ShippingLine,
    ShopifyError,
};

pub const SHOP_NOT_CONNECTED: &str = "shop not connected";
pub const VARIANT_NOT_FOUND: &str = "variant not found";

/// Errors that abort a submission before a local order exists.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] WireError),

    #[error("missing shop")]
    MissingShop,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A decoded order submission.
#[derive(Debug, Clone)]
pub struct OrderSubmission {
    pub form: OrderRequestForm,
    pub client_ip: Option<String>,
}

/// Runs order submissions against a store and a platform.
pub struct OrderPipeline<'a, S, P> {
    store: &'a S,
    platform: &'a P,
}

/// What the platform said, after the optional retry.
struct PlatformOutcome {
    result: Result<CreatedPlatformOrder, String>,
    transient: bool,
    note: Option<String>,
}

impl<'a, S: OrderStore, P: CommercePlatform> OrderPipeline<'a, S, P> {
    #[must_use]
    pub const fn new(store: &'a S, platform: &'a P) -> Self {
        Self { store, platform }
    }

    /// Process one submission.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError` when the request cannot be decoded or the local
    /// order cannot be stored. Every later failure is reported in the response.
    #[instrument(skip(self, submission, now), fields(shop = %submission.form.shop, local_order_id = tracing::field::Empty))]
    pub async fn submit(
        &self,
        submission: &OrderSubmission,
        now: DateTime<Utc>,
    ) -> Result<OrderResponse, PipelineError> {
        let form = &submission.form;
        let shop = form.shop.trim();
        if shop.is_empty() {
            return Err(PipelineError::MissingShop);
        }
        let client_ip = submission.client_ip.as_deref();

        let product = form.product()?;
        let quantity = form.quantity()?;
        let claimed_shipping = form.shipping()?;
        let claimed_totals = form.totals()?;
        let source = form.config()?.source();

        let settings = self.store.shop_settings(shop).await?;
        let submitted = form.customer();
        if let Err(error) = validate_values(&settings.form, |name| submitted.value(name)) {
            tracing::info!(field = %error.name, "Submission rejected by form settings");
            return Ok(OrderResponse::invalid_field(&error));
        }
        let customer = submitted.normalized(now);

        if let BlockDecision::Blocked { message, .. } =
            blocking::check(self.store, shop, &customer, client_ip, now).await?
        {
            return Ok(OrderResponse::blocked(message));
        }

        let shipping = resolve_shipping(&settings, claimed_shipping.as_ref());
        let shipping_price = shipping.as_ref().map_or(Decimal::ZERO, |r| r.price);
        let selection = claimed_totals
            .as_ref()
            .map(|t| t.offer.clone())
            .unwrap_or_default();

        let mut metadata = OrderMetadata {
            source: source.clone(),
            claimed_totals: claimed_totals.as_ref().map(|t| t.quote),
            ..OrderMetadata::default()
        };
        metadata.record("received", client_ip.map(|ip| format!("ip {ip}")));

        let mut offer = resolve_offer(
            &settings,
            &selection,
            &product,
            subtotal(product.price, quantity),
            &mut metadata,
        );
        let priced = quote(product.price, quantity, &offer, shipping_price);
        if let Some(claimed) = claimed_totals.as_ref()
            && claimed.quote.total != priced.total
        {
            tracing::info!(
                claimed = %claimed.quote.total,
                priced = %priced.total,
                "Client total differs from server price"
            );
        }
        metadata.offer = offer.clone();

        let mut order = self
            .store
            .insert_local_order(&NewLocalOrder {
                shop: shop.to_string(),
                customer: customer.clone(),
                shipping: shipping.clone(),
                line_items: vec![order_line(&product, &priced)],
                totals: priced,
                client_ip: client_ip.map(str::to_string),
                metadata,
            })
            .await?;
        tracing::Span::current().record("local_order_id", order.id.as_i32());
        tracing::info!(order_number = %order.order_number(), "Local order stored");

        let Some(session) = self.store.shop_session(shop).await? else {
            tracing::warn!("No session for shop, platform order skipped");
            order.metadata.record_error("platform", SHOP_NOT_CONNECTED.to_string());
            let order = self.save(order).await;
            return Ok(respond(
                &order,
                &settings,
                &product,
                Err(SHOP_NOT_CONNECTED.to_string()),
            ));
        };

        let outcome = match self.unit_price(&session, &product).await {
            Ok(unit_price) => {
                if unit_price != product.price {
                    reprice_offer(&mut offer, subtotal(unit_price, quantity));
                }
                let priced = quote(unit_price, quantity, &offer, shipping_price);
                order.metadata.record("priced", Some(format!("total {}", priced.total)));
                order.metadata.offer = offer.clone();
                order.line_items = vec![order_line(&product, &priced)];
                order.totals = priced;

                self.create_platform_order(
                    &session,
                    &settings,
                    &customer,
                    &product,
                    &priced,
                    &offer,
                    shipping.as_ref(),
                    client_ip,
                    &source,
                    &mut order.metadata,
                )
                .await
            }
            Err(outcome) => outcome,
        };

        if let Some(note) = outcome.note {
            order.note = Some(note);
        }
        let platform = match outcome.result {
            Ok(created) => {
                tracing::info!(
                    platform_order_id = %created.id,
                    order_type = created.order_type.as_str(),
                    "Platform order created"
                );
                order.status = LocalOrderStatus::Created;
                order.order_type = Some(created.order_type);
                order.platform_order_id = Some(created.id.clone());
                order.platform_order_number.clone_from(&created.name);
                order.metadata.platform_response = Some(created.raw.clone());
                order.metadata.record("platform", Some(created.id.to_string()));
                Ok(created)
            }
            Err(error) => {
                if !outcome.transient {
                    order.status = LocalOrderStatus::Failed;
                }
                order.metadata.record_error("platform", error.clone());
                Err(error)
            }
        };

        let order = self.save(order).await;
        Ok(respond(&order, &settings, &product, platform))
    }

    /// Platform price for the variant. The platform order is only created
    /// at this price; a failed lookup ends the attempt.
    async fn unit_price(
        &self,
        session: &ShopSession,
        product: &ProductSnapshot,
    ) -> Result<Decimal, PlatformOutcome> {
        match self.platform.variant_price(session, &product.variant_id).await {
            Ok(Some(price)) => Ok(price),
            Ok(None) => {
                tracing::warn!(variant_id = %product.variant_id, "Variant not found on platform");
                Err(PlatformOutcome {
                    result: Err(format!("{VARIANT_NOT_FOUND}: {}", product.variant_id)),
                    transient: false,
                    note: None,
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "Variant price lookup failed, platform order deferred");
                Err(PlatformOutcome {
                    result: Err(format!("price lookup failed: {e}")),
                    transient: true,
                    note: None,
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_platform_order(
        &self,
        session: &ShopSession,
        settings: &ShopSettings,
        customer: &CustomerFields,
        product: &ProductSnapshot,
        priced: &PriceQuote,
        offer: &ActiveOffer,
        shipping: Option<&ShippingRate>,
        client_ip: Option<&str>,
        source: &str,
        metadata: &mut OrderMetadata,
    ) -> PlatformOutcome {
        let order_settings = &settings.order_settings;
        let note = AuditNote {
            customer,
            quote: priced,
            offer,
            shipping,
            client_ip,
            source,
            fallback_reason: None,
        };
        let email = customer.valid_email().map(|e| e.normalized());
        let phone = customer.phone().map(str::to_string);
        let address = customer.address(&order_settings.default_country);

        let mut new_order = NewOrder {
            line_items: vec![NewOrderLine {
                variant_id: product.variant_id.clone(),
                quantity: priced.quantity,
                price: priced.unit_price,
                title: product.title.clone(),
            }],
            customer: None,
            email: email.clone(),
            phone: phone.clone(),
            shipping_address: Some(address.clone()),
            billing_address: Some(address),
            shipping_line: shipping.map(|rate| ShippingLine {
                code: rate.id.clone(),
                title: rate.name.clone(),
                price: priced.shipping,
            }),
            discount: (priced.discount_amount > Decimal::ZERO).then(|| OrderDiscount {
                title: discount_title(offer),
                amount: priced.discount_amount,
            }),
            note: note.render(),
            tags: order_settings.tag_list(),
            send_receipt: order_settings.send_receipt,
        };

        if !order_settings.save_as_draft {
            let existing = match self
                .platform
                .find_customer(session, email.as_deref(), phone.as_deref())
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(error = %e, "Customer lookup failed, creating a new customer");
                    None
                }
            };
            new_order.customer = Some(existing.map_or_else(
                || CustomerInput::New {
                    first_name: customer.first_name.clone(),
                    last_name: customer.last_name.clone(),
                    email: email.clone(),
                    phone: phone.clone(),
                    accepts_marketing: customer.subscribe,
                },
                CustomerInput::Existing,
            ));
        }

        let first = self.create(session, order_settings.save_as_draft, &new_order).await;
        let error = match first {
            Ok(created) => {
                return PlatformOutcome {
                    result: Ok(created),
                    transient: false,
                    note: Some(new_order.note),
                };
            }
            Err(error) => error,
        };

        if !error.rejects_customer() {
            tracing::warn!(error = %error, "Platform order failed");
            return PlatformOutcome {
                transient: error.is_transient(),
                result: Err(error.to_string()),
                note: Some(new_order.note),
            };
        }

        let reason = error.to_string();
        tracing::warn!(reason = %reason, "Customer rejected by platform, retrying without customer");
        metadata.record("customer_rejected", Some(reason.clone()));
        let fallback_note = AuditNote {
            fallback_reason: Some(&reason),
            ..note
        }
        .render();
        let retry = new_order.without_customer(
            customer.fallback_address(&order_settings.default_country),
            fallback_note,
        );

        match self.create(session, order_settings.save_as_draft, &retry).await {
            Ok(created) => PlatformOutcome {
                result: Ok(created),
                transient: false,
                note: Some(retry.note),
            },
            Err(error) => {
                tracing::warn!(error = %error, "Platform order failed after customer fallback");
                PlatformOutcome {
                    transient: error.is_transient(),
                    result: Err(error.to_string()),
                    note: Some(retry.note),
                }
            }
        }
    }

    async fn create(
        &self,
        session: &ShopSession,
        draft: bool,
        order: &NewOrder,
    ) -> Result<CreatedPlatformOrder, ShopifyError> {
        if draft {
            self.platform.create_draft_order(session, order).await
        } else {
            self.platform.create_order(session, order).await
        }
    }

    /// Best-effort write-back; the row already exists, so a failure here is
    /// logged and the in-memory state is returned.
    async fn save(&self, order: LocalOrder) -> LocalOrder {
        match self.store.update_local_order(&order).await {
            Ok(saved) => saved,
            Err(e) => {
                let event_id = sentry::capture_error(&e);
                tracing::error!(
                    error = %e,
                    sentry_event_id = %event_id,
                    "Failed to update local order"
                );
                order
            }
        }
    }
}

/// Server-held rate matching the submitted id, else the first configured rate.
fn resolve_shipping(settings: &ShopSettings, claimed: Option<&ShippingRate>) -> Option<ShippingRate> {
    let claimed_id = claimed.map(|rate| rate.id.as_str());
    let rate = select_rate(&settings.shipping, claimed_id).cloned();
    if let (Some(claimed), Some(rate)) = (claimed, rate.as_ref())
        && claimed.id != rate.id
    {
        tracing::warn!(claimed = %claimed.id, used = %rate.id, "Unknown shipping rate submitted");
    }
    rate
}

/// Undiscounted merchandise subtotal, with the calculator's bounds.
fn subtotal(unit_price: Decimal, quantity: u32) -> Decimal {
    quote(unit_price, quantity, &ActiveOffer::None, Decimal::ZERO).subtotal
}

/// Refresh a single discount's display prices after a price change.
fn reprice_offer(offer: &mut ActiveOffer, subtotal: Decimal) {
    if let ActiveOffer::SingleDiscount(active) = offer {
        active.reprice(subtotal);
    }
}

/// Resolve the client's offer choice against the shop's own catalog.
fn resolve_offer(
    settings: &ShopSettings,
    selection: &OfferSelection,
    product: &ProductSnapshot,
    subtotal: Decimal,
    metadata: &mut OrderMetadata,
) -> ActiveOffer {
    match settings.offers.resolve(selection, &product.id, subtotal) {
        Ok(offer) => offer,
        Err(e) => {
            tracing::warn!(error = %e, "Submitted offer rejected, pricing without it");
            metadata.record("offer_rejected", Some(e.to_string()));
            ActiveOffer::None
        }
    }
}

fn discount_title(offer: &ActiveOffer) -> String {
    match offer {
        ActiveOffer::QuantityTier(selected) if !selected.tier.text.trim().is_empty() => {
            selected.tier.text.trim().to_string()
        }
        ActiveOffer::QuantityTier(selected) => {
            format!("Bundle x{}", selected.tier.effective_quantity())
        }
        ActiveOffer::SingleDiscount(active) => match &active.source {
            DiscountSource::Code { code } => code.clone(),
            DiscountSource::Downsell { .. } => "Special offer".to_string(),
        },
        ActiveOffer::None => "Discount".to_string(),
    }
}

fn order_line(product: &ProductSnapshot, priced: &PriceQuote) -> OrderLine {
    OrderLine {
        variant_id: product.variant_id.clone(),
        product_id: product.id.clone(),
        title: product.title.clone(),
        variant_title: product.variant_title.clone(),
        quantity: priced.quantity,
        unit_price: priced.unit_price,
        discount_amount: priced.discount_amount,
        upsell_id: None,
    }
}

fn respond(
    order: &LocalOrder,
    settings: &ShopSettings,
    product: &ProductSnapshot,
    platform: Result<CreatedPlatformOrder, String>,
) -> OrderResponse {
    let (shopify, integration, status_url, number) = match platform {
        Ok(created) => {
            let number = created
                .name
                .as_deref()
                .map(|name| name.trim_start_matches('#').to_string());
            (
                PlatformOrderResult {
                    success: true,
                    order_type: Some(created.order_type),
                    order_id: Some(created.id),
                    order_number: created.name,
                    error: None,
                },
                IntegrationStatus::success(),
                created.status_url,
                number,
            )
        }
        Err(error) => (
            PlatformOrderResult {
                success: false,
                error: Some(error.clone()),
                ..PlatformOrderResult::default()
            },
            IntegrationStatus::failed(error),
            None,
            None,
        ),
    };

    let number = number.unwrap_or_else(|| order.order_number());
    let summary = order_summary(&number, &product.title, &order.totals);

    OrderResponse {
        success: true,
        local_order: Some(order.reference()),
        shopify: Some(shopify),
        redirect: Some(
            settings
                .order_settings
                .redirect
                .descriptor(status_url.as_deref(), &summary),
        ),
        integrations: Some(Integrations {
            shopify: integration,
            spreadsheet: IntegrationStatus::skipped(),
        }),
        ..OrderResponse::default()
    }
}
