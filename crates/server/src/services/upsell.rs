//! Post-purchase upsells.
//!
//! The shopper accepted an extra item after the order was placed. The variant
//! must belong to the upsell's product and is priced from the platform with
//! the shop's own upsell discount. The line is appended to the platform order
//! (or draft) and recorded on the local order. A stored claim per order and
//! upsell makes concurrent repeats answer `already_applied`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use codform_core::offers::Upsell;
use codform_core::pricing::{ActiveOffer, quote};
use codform_core::wire::{UpsellRequest, UpsellResponse};
use codform_core::{OrderType, round_money};

use super::platform::CommercePlatform;
use super::store::OrderStore;
use crate::db::RepositoryError;
use crate::models::{LocalOrder, OrderLine, ShopSession, UpsellRecord};
use crate::shopify::UpsellLine;

pub const UPSELL_ADDED: &str = "Upsell added";
pub const UPSELL_FAILED: &str = "Could not add the item to your order";

#[derive(Debug, Error)]
pub enum UpsellError {
    #[error("order not found")]
    OrderNotFound,

    #[error("unknown upsell: {0}")]
    UnknownUpsell(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct UpsellService<'a, S, P> {
    store: &'a S,
    platform: &'a P,
}

impl<'a, S: OrderStore, P: CommercePlatform> UpsellService<'a, S, P> {
    #[must_use]
    pub const fn new(store: &'a S, platform: &'a P) -> Self {
        Self { store, platform }
    }

    /// Add the accepted upsell to an existing order.
    ///
    /// Platform failures are reported as `success: false` and never undo the
    /// original order.
    ///
    /// # Errors
    ///
    /// Returns `UpsellError` when the order or the upsell does not exist, or
    /// storage fails.
    #[instrument(
        skip(self, request, now),
        fields(shop = %request.shop, order_id = %request.original_order_id, upsell_id = %request.upsell_id)
    )]
    pub async fn apply(
        &self,
        request: &UpsellRequest,
        now: DateTime<Utc>,
    ) -> Result<UpsellResponse, UpsellError> {
        let shop = request.shop.trim();
        let mut order = self
            .store
            .local_order(shop, request.original_order_id)
            .await?
            .ok_or(UpsellError::OrderNotFound)?;

        if let Some(record) = order.metadata.upsell(&request.upsell_id) {
            tracing::info!("Upsell already applied");
            return Ok(already_applied(record.shopify_updated));
        }

        let settings = self.store.shop_settings(shop).await?;
        let upsell = settings
            .offers
            .upsell(&request.upsell_id)
            .ok_or_else(|| UpsellError::UnknownUpsell(request.upsell_id.clone()))?;
        if request.discount != upsell.discount {
            tracing::debug!("Client upsell discount ignored");
        }

        let (Some(session), Some(platform_order_id)) = (
            self.store.shop_session(shop).await?,
            order.platform_order_id.clone(),
        ) else {
            tracing::warn!("Order has no platform counterpart, upsell not applied");
            return self
                .fail(&mut order, "order was never created on the platform".to_string())
                .await;
        };

        if !self.store.claim_upsell(order.id, &request.upsell_id).await? {
            tracing::info!("Upsell claimed by a concurrent request");
            return Ok(already_applied(false));
        }

        let line = match self.upsell_line(&session, upsell, request).await {
            Ok(line) => line,
            Err(error) => return self.release(&mut order, &request.upsell_id, error).await,
        };

        let appended = match order.order_type {
            Some(OrderType::DraftOrder) => {
                self.platform
                    .append_to_draft_order(&session, &platform_order_id, &line)
                    .await
            }
            _ => {
                self.platform
                    .append_to_order(&session, &platform_order_id, &line)
                    .await
            }
        };

        if let Err(e) = appended {
            tracing::warn!(error = %e, "Upsell could not be added");
            return self.release(&mut order, &request.upsell_id, e.to_string()).await;
        }

        let discount_amount = round_money(line.discount_amount());
        let gross = quote(line.unit_price, line.quantity, &ActiveOffer::None, Decimal::ZERO).subtotal;
        order.line_items.push(OrderLine {
            variant_id: line.variant_id.clone(),
            product_id: request.product.id.clone(),
            title: line.title.clone(),
            variant_title: request.product.variant_title.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount_amount,
            upsell_id: Some(request.upsell_id.clone()),
        });
        order.totals.subtotal += gross;
        order.totals.discount_amount += discount_amount;
        order.totals.total += gross - discount_amount;
        order.metadata.upsells.push(UpsellRecord {
            upsell_id: request.upsell_id.clone(),
            variant_id: line.variant_id.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            discount_amount,
            shopify_updated: true,
            at: now,
        });
        order
            .metadata
            .record("upsell", Some(request.upsell_id.clone()));
        self.store.update_local_order(&order).await?;
        tracing::info!(amount = %(gross - discount_amount), "Upsell added");

        Ok(UpsellResponse {
            success: true,
            shopify_updated: true,
            already_applied: false,
            message: UPSELL_ADDED.to_string(),
        })
    }

    /// The line to append: the requested variant of the upsell's product at
    /// its platform price, with the quantity capped by the upsell.
    async fn upsell_line(
        &self,
        session: &ShopSession,
        upsell: &Upsell,
        request: &UpsellRequest,
    ) -> Result<UpsellLine, String> {
        let variant_id = if request.variant_id.is_empty() {
            request.product.variant_id.clone()
        } else {
            request.variant_id.clone()
        };

        let variants = self
            .platform
            .product_variants(session, &upsell.product_handle)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Upsell product lookup failed");
                format!("product lookup failed: {e}")
            })?;
        let Some(variant) = variants.into_iter().find(|v| v.id == variant_id) else {
            tracing::warn!(variant_id = %variant_id, handle = %upsell.product_handle, "Variant outside the upsell product");
            return Err(format!(
                "variant {variant_id} is not part of {}",
                upsell.product_handle
            ));
        };

        let quantity = upsell.capped_quantity(request.quantity);
        if quantity != request.quantity {
            tracing::debug!(requested = request.quantity, quantity, "Upsell quantity capped");
        }

        Ok(UpsellLine {
            variant_id,
            quantity,
            unit_price: round_money(variant.price),
            discount: upsell.discount,
            title: request.product.title.clone(),
        })
    }

    /// Give the claim back so the shopper can retry, then fail.
    async fn release(
        &self,
        order: &mut LocalOrder,
        upsell_id: &str,
        error: String,
    ) -> Result<UpsellResponse, UpsellError> {
        self.store.release_upsell(order.id, upsell_id).await?;
        self.fail(order, error).await
    }

    async fn fail(
        &self,
        order: &mut LocalOrder,
        error: String,
    ) -> Result<UpsellResponse, UpsellError> {
        order.metadata.record_error("upsell", error);
        self.store.update_local_order(order).await?;
        Ok(UpsellResponse {
            success: false,
            message: UPSELL_FAILED.to_string(),
            ..UpsellResponse::default()
        })
    }
}

fn already_applied(shopify_updated: bool) -> UpsellResponse {
    UpsellResponse {
        success: true,
        shopify_updated,
        already_applied: true,
        message: UPSELL_ADDED.to_string(),
    }
}
