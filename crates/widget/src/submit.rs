//! Order submission.
//!
//! One request at a time: a second [`OrderSubmissionClient::submit`] while
//! the first is in flight is rejected without touching the network. The
//! response is interpreted in layers: transport failure, then status, then
//! body shape, then the blocked marker.

use std::sync::atomic::{AtomicBool, Ordering};

use codform_core::settings::{RedirectDescriptor, RedirectSettings};
use codform_core::wire::{
    LocalOrderRef, OrderRequestForm, OrderResponse, PlatformOrderResult, UpsellRequest,
    UpsellResponse,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{CheckoutApi, RawResponse};

/// Why a submission did not produce an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitFailure {
    /// Another submission is still running.
    #[error("a submission is already in flight")]
    InFlight,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned status {0}")]
    Status(u16),
    /// 2xx, but not a body we understand.
    #[error("unexpected response body")]
    UnexpectedResponse,
    /// The server answered `success: false`.
    #[error("order rejected: {0}")]
    Rejected(String),
}

/// What the server created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub local_order: Option<LocalOrderRef>,
    pub platform: Option<PlatformOrderResult>,
    pub redirect: RedirectDescriptor,
}

/// Result of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(CreatedOrder),
    /// Stopped by the merchant's blocking rules. Not an error.
    Blocked { message: String },
    Failed(SubmitFailure),
}

/// Clears the in-flight flag when dropped, whatever happened.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Sends orders and upsell additions to the checkout service.
pub struct OrderSubmissionClient<C> {
    api: C,
    in_flight: AtomicBool,
    upsell_in_flight: AtomicBool,
}

impl<C: CheckoutApi> OrderSubmissionClient<C> {
    #[must_use]
    pub const fn new(api: C) -> Self {
        Self {
            api,
            in_flight: AtomicBool::new(false),
            upsell_in_flight: AtomicBool::new(false),
        }
    }

    /// Whether an order submission is running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Submit an order.
    #[instrument(skip(self, form), fields(shop = %form.shop, variant_id = %form.variant_id))]
    pub async fn submit(&self, form: &OrderRequestForm) -> SubmitOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("submission rejected, another one is in flight");
            return SubmitOutcome::Failed(SubmitFailure::InFlight);
        };

        let outcome = match self.api.create_order(form).await {
            Ok(raw) => interpret(&raw),
            Err(e) => SubmitOutcome::Failed(SubmitFailure::Transport(e.to_string())),
        };

        match &outcome {
            SubmitOutcome::Created(created) => info!(
                local_order = ?created.local_order.as_ref().map(|o| o.id),
                "order created"
            ),
            SubmitOutcome::Blocked { .. } => info!("order blocked"),
            SubmitOutcome::Failed(failure) => warn!(error = %failure, "order submission failed"),
        }
        outcome
    }

    /// Ask the server to add an accepted upsell to the order.
    ///
    /// # Errors
    ///
    /// Returns a [`SubmitFailure`] when the request fails or the server
    /// reports the addition as unsuccessful.
    #[instrument(skip(self, request), fields(upsell_id = %request.upsell_id))]
    pub async fn add_upsell(&self, request: &UpsellRequest) -> Result<UpsellResponse, SubmitFailure> {
        let Some(_guard) = InFlightGuard::acquire(&self.upsell_in_flight) else {
            return Err(SubmitFailure::InFlight);
        };

        let raw = self
            .api
            .add_upsell(request)
            .await
            .map_err(|e| SubmitFailure::Transport(e.to_string()))?;
        if !raw.is_success() {
            return Err(SubmitFailure::Status(raw.status));
        }
        let response: UpsellResponse =
            serde_json::from_str(&raw.body).map_err(|_| SubmitFailure::UnexpectedResponse)?;
        if response.success {
            Ok(response)
        } else {
            Err(SubmitFailure::Rejected(response.message))
        }
    }
}

/// Interpret a raw order response.
fn interpret(raw: &RawResponse) -> SubmitOutcome {
    if !raw.is_success() {
        return SubmitOutcome::Failed(SubmitFailure::Status(raw.status));
    }
    let Ok(response) = serde_json::from_str::<OrderResponse>(&raw.body) else {
        return SubmitOutcome::Failed(SubmitFailure::UnexpectedResponse);
    };
    if response.is_blocked() {
        return SubmitOutcome::Blocked {
            message: response.message.unwrap_or_default(),
        };
    }
    if !response.success {
        return SubmitOutcome::Failed(SubmitFailure::Rejected(
            response.error.unwrap_or_default(),
        ));
    }

    let redirect = response
        .redirect
        .unwrap_or_else(|| RedirectSettings::default().descriptor(None, ""));
    SubmitOutcome::Created(CreatedOrder {
        local_order: response.local_order,
        platform: response.shopify,
        redirect,
    })
}
