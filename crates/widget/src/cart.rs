//! Cart synchronization.
//!
//! The platform cart mirrors what the form is about to order, so abandoned
//! checkouts still show up in the merchant's cart analytics. Every update is
//! "clear, then add one line"; updates never overlap. Requests made while an
//! update is running are coalesced: only the latest one is applied once the
//! running update finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use codform_core::PlatformId;
use tracing::{debug, instrument, warn};

use crate::api::StorefrontApi;
use crate::error::WidgetError;

/// The one line the cart should contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub variant_id: PlatformId,
    pub quantity: u32,
}

/// Serializes cart mutations against the storefront.
pub struct CartSynchronizer<S> {
    storefront: S,
    busy: AtomicBool,
    pending: Mutex<Option<CartLine>>,
    last_synced: Mutex<Option<CartLine>>,
}

impl<S: StorefrontApi> CartSynchronizer<S> {
    #[must_use]
    pub fn new(storefront: S) -> Self {
        Self {
            storefront,
            busy: AtomicBool::new(false),
            pending: Mutex::new(None),
            last_synced: Mutex::new(None),
        }
    }

    /// The line most recently written to the cart.
    #[must_use]
    pub fn last_synced(&self) -> Option<CartLine> {
        self.last_synced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Request that the cart contain `line`.
    ///
    /// When another update is running this only records the request and
    /// returns; the running update picks it up.
    ///
    /// # Errors
    ///
    /// Returns the storefront error of the last attempted update.
    #[instrument(skip(self), fields(variant_id = %line.variant_id, quantity = line.quantity))]
    pub async fn sync(&self, line: CartLine) -> Result<(), WidgetError> {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(line);

        if self.busy.swap(true, Ordering::AcqRel) {
            debug!("cart update in flight, coalescing");
            return Ok(());
        }

        let mut result = Ok(());
        loop {
            let next = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            let Some(next) = next else {
                self.busy.store(false, Ordering::Release);
                // A request may have slipped in between the take and the store.
                let raced = self
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some();
                if raced && !self.busy.swap(true, Ordering::AcqRel) {
                    continue;
                }
                break;
            };

            if self.last_synced().as_ref() == Some(&next) {
                continue;
            }

            result = self.apply(&next).await;
            match &result {
                Ok(()) => {
                    *self.last_synced.lock().unwrap_or_else(PoisonError::into_inner) = Some(next);
                }
                Err(e) => warn!(error = %e, "cart update failed"),
            }
        }
        result
    }

    async fn apply(&self, line: &CartLine) -> Result<(), WidgetError> {
        self.storefront.clear_cart().await?;
        self.storefront
            .add_to_cart(&line.variant_id, line.quantity.max(1))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeStorefront, StorefrontCall};

    fn line(variant: &str, quantity: u32) -> CartLine {
        CartLine {
            variant_id: PlatformId::new(variant),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_sync_clears_then_adds() {
        let storefront = FakeStorefront::default();
        let cart = CartSynchronizer::new(storefront.clone());
        cart.sync(line("202", 2)).await.unwrap();
        assert_eq!(
            storefront.calls(),
            vec![
                StorefrontCall::Clear,
                StorefrontCall::Add(PlatformId::new("202"), 2)
            ]
        );
        assert_eq!(cart.last_synced(), Some(line("202", 2)));
    }

    #[tokio::test]
    async fn test_identical_line_not_resent() {
        let storefront = FakeStorefront::default();
        let cart = CartSynchronizer::new(storefront.clone());
        cart.sync(line("202", 1)).await.unwrap();
        cart.sync(line("202", 1)).await.unwrap();
        assert_eq!(storefront.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_updates_coalesce_latest_wins() {
        let storefront = FakeStorefront::default().with_latency();
        let cart = CartSynchronizer::new(storefront.clone());

        let (a, b, c) = tokio::join!(
            cart.sync(line("1", 1)),
            cart.sync(line("2", 1)),
            cart.sync(line("3", 5)),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        // First request runs; the two queued behind it collapse into the last.
        let adds: Vec<_> = storefront
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                StorefrontCall::Add(id, q) => Some((id.as_str().to_string(), q)),
                StorefrontCall::Clear => None,
            })
            .collect();
        assert_eq!(adds, vec![("1".to_string(), 1), ("3".to_string(), 5)]);
        assert_eq!(cart.last_synced(), Some(line("3", 5)));
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let storefront = FakeStorefront::default().failing_cart();
        let cart = CartSynchronizer::new(storefront);
        assert!(cart.sync(line("1", 1)).await.is_err());
        assert_eq!(cart.last_synced(), None);
    }
}
