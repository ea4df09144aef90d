//! Commerce platform seam for the order pipeline.

use std::future::Future;

use rust_decimal::Decimal;

use codform_core::PlatformId;

use crate::models::ShopSession;
use crate::shopify::{
    CreatedPlatformOrder, NewOrder, ProductVariant, ShopifyClient, ShopifyError, UpsellLine,
};

/// Platform operations the pipeline needs.
pub trait CommercePlatform: Send + Sync {
    fn variant_price(
        &self,
        session: &ShopSession,
        variant_id: &PlatformId,
    ) -> impl Future<Output = Result<Option<Decimal>, ShopifyError>> + Send;

    /// Variants of the product with `handle`; empty when it does not exist.
    fn product_variants(
        &self,
        session: &ShopSession,
        handle: &str,
    ) -> impl Future<Output = Result<Vec<ProductVariant>, ShopifyError>> + Send;

    fn find_customer(
        &self,
        session: &ShopSession,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> impl Future<Output = Result<Option<PlatformId>, ShopifyError>> + Send;

    fn create_order(
        &self,
        session: &ShopSession,
        order: &NewOrder,
    ) -> impl Future<Output = Result<CreatedPlatformOrder, ShopifyError>> + Send;

    fn create_draft_order(
        &self,
        session: &ShopSession,
        order: &NewOrder,
    ) -> impl Future<Output = Result<CreatedPlatformOrder, ShopifyError>> + Send;

    fn append_to_draft_order(
        &self,
        session: &ShopSession,
        draft_id: &PlatformId,
        line: &UpsellLine,
    ) -> impl Future<Output = Result<(), ShopifyError>> + Send;

    fn append_to_order(
        &self,
        session: &ShopSession,
        order_id: &PlatformId,
        line: &UpsellLine,
    ) -> impl Future<Output = Result<(), ShopifyError>> + Send;
}

impl CommercePlatform for ShopifyClient {
    async fn variant_price(
        &self,
        session: &ShopSession,
        variant_id: &PlatformId,
    ) -> Result<Option<Decimal>, ShopifyError> {
        Self::variant_price(self, session, variant_id).await
    }

    async fn product_variants(
        &self,
        session: &ShopSession,
        handle: &str,
    ) -> Result<Vec<ProductVariant>, ShopifyError> {
        Self::product_variants(self, session, handle).await
    }

    async fn find_customer(
        &self,
        session: &ShopSession,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<PlatformId>, ShopifyError> {
        Self::find_customer(self, session, email, phone).await
    }

    async fn create_order(
        &self,
        session: &ShopSession,
        order: &NewOrder,
    ) -> Result<CreatedPlatformOrder, ShopifyError> {
        Self::create_order(self, session, order).await
    }

    async fn create_draft_order(
        &self,
        session: &ShopSession,
        order: &NewOrder,
    ) -> Result<CreatedPlatformOrder, ShopifyError> {
        Self::create_draft_order(self, session, order).await
    }

    async fn append_to_draft_order(
        &self,
        session: &ShopSession,
        draft_id: &PlatformId,
        line: &UpsellLine,
    ) -> Result<(), ShopifyError> {
        Self::append_to_draft_order(self, session, draft_id, line).await
    }

    async fn append_to_order(
        &self,
        session: &ShopSession,
        order_id: &PlatformId,
        line: &UpsellLine,
    ) -> Result<(), ShopifyError> {
        Self::append_to_order(self, session, order_id, line).await
    }
}
