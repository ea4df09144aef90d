//! In-memory fakes for the network seams.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use codform_core::PlatformId;
use codform_core::settings::ShopSettings;
use codform_core::wire::{OrderRequestForm, OrderResponse, UpsellRequest, UpsellResponse};

use crate::api::{CheckoutApi, RawResponse, StorefrontApi};
use crate::error::WidgetError;
use crate::product::StorefrontProduct;

async fn pause(latency: bool) {
    if latency {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorefrontCall {
    Clear,
    Add(PlatformId, u32),
}

#[derive(Default)]
struct StorefrontInner {
    products: HashMap<String, StorefrontProduct>,
    calls: Vec<StorefrontCall>,
    latency: bool,
    fail_cart: bool,
}

/// Storefront with a fixed product list that records cart calls.
#[derive(Clone, Default)]
pub struct FakeStorefront {
    inner: Arc<Mutex<StorefrontInner>>,
}

impl FakeStorefront {
    pub fn with_product(product: StorefrontProduct) -> Self {
        Self::default().and_product(product)
    }

    pub fn and_product(self, product: StorefrontProduct) -> Self {
        self.inner
            .lock()
            .unwrap()
            .products
            .insert(product.handle.clone(), product);
        self
    }

    pub fn with_latency(self) -> Self {
        self.inner.lock().unwrap().latency = true;
        self
    }

    pub fn failing_cart(self) -> Self {
        self.inner.lock().unwrap().fail_cart = true;
        self
    }

    pub fn calls(&self) -> Vec<StorefrontCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn cart_call(&self, call: StorefrontCall) -> (bool, Result<(), WidgetError>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_cart {
            return (inner.latency, Err(WidgetError::status(500, "cart unavailable")));
        }
        inner.calls.push(call);
        (inner.latency, Ok(()))
    }
}

impl StorefrontApi for FakeStorefront {
    async fn fetch_product(&self, handle: &str) -> Result<StorefrontProduct, WidgetError> {
        let product = self.inner.lock().unwrap().products.get(handle).cloned();
        product.ok_or_else(|| WidgetError::NotFound(format!("product {handle}")))
    }

    async fn clear_cart(&self) -> Result<(), WidgetError> {
        let (latency, result) = self.cart_call(StorefrontCall::Clear);
        pause(latency).await;
        result
    }

    async fn add_to_cart(&self, variant_id: &PlatformId, quantity: u32) -> Result<(), WidgetError> {
        let (latency, result) = self.cart_call(StorefrontCall::Add(variant_id.clone(), quantity));
        pause(latency).await;
        result
    }
}

struct CheckoutInner {
    settings: ShopSettings,
    order_response: RawResponse,
    upsell_response: UpsellResponse,
    orders: Vec<OrderRequestForm>,
    upsells: Vec<UpsellRequest>,
    latency: bool,
    unreachable: bool,
}

fn json(status: u16, body: &impl serde::Serialize) -> RawResponse {
    RawResponse {
        status,
        body: serde_json::to_string(body).unwrap(),
    }
}

impl Default for CheckoutInner {
    fn default() -> Self {
        let created: OrderResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "localOrder": {"id": 1, "orderNumber": "COD-1001", "status": "created"},
            "shopify": {"success": true, "orderType": "order", "orderId": "555", "orderNumber": "#1001"}
        }))
        .unwrap();
        Self {
            settings: ShopSettings::default(),
            order_response: json(200, &created),
            upsell_response: UpsellResponse {
                success: true,
                shopify_updated: true,
                already_applied: false,
                message: "Upsell added".to_string(),
            },
            orders: Vec::new(),
            upsells: Vec::new(),
            latency: false,
            unreachable: false,
        }
    }
}

/// Checkout service that records requests and answers with canned bodies.
/// Orders succeed by default.
#[derive(Clone, Default)]
pub struct FakeCheckoutApi {
    inner: Arc<Mutex<CheckoutInner>>,
}

impl FakeCheckoutApi {
    pub fn with_settings(self, settings: ShopSettings) -> Self {
        self.inner.lock().unwrap().settings = settings;
        self
    }

    pub fn with_latency(self) -> Self {
        self.inner.lock().unwrap().latency = true;
        self
    }

    /// Every request fails at the transport level.
    pub fn unreachable(self) -> Self {
        self.inner.lock().unwrap().unreachable = true;
        self
    }

    pub fn with_order_response(self, response: RawResponse) -> Self {
        self.inner.lock().unwrap().order_response = response;
        self
    }

    pub fn blocked(self, message: &str) -> Self {
        self.with_order_response(json(200, &OrderResponse::blocked(message)))
    }

    pub fn with_upsell_response(self, response: UpsellResponse) -> Self {
        self.inner.lock().unwrap().upsell_response = response;
        self
    }

    pub fn order_calls(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }

    pub fn order_forms(&self) -> Vec<OrderRequestForm> {
        self.inner.lock().unwrap().orders.clone()
    }

    pub fn upsell_requests(&self) -> Vec<UpsellRequest> {
        self.inner.lock().unwrap().upsells.clone()
    }
}

impl CheckoutApi for FakeCheckoutApi {
    async fn fetch_config(&self, _shop: &str) -> Result<ShopSettings, WidgetError> {
        Ok(self.inner.lock().unwrap().settings.clone())
    }

    async fn create_order(&self, form: &OrderRequestForm) -> Result<RawResponse, WidgetError> {
        let (latency, result) = {
            let mut inner = self.inner.lock().unwrap();
            inner.orders.push(form.clone());
            let result = if inner.unreachable {
                Err(WidgetError::NotFound("connection refused".to_string()))
            } else {
                Ok(inner.order_response.clone())
            };
            (inner.latency, result)
        };
        pause(latency).await;
        result
    }

    async fn add_upsell(&self, request: &UpsellRequest) -> Result<RawResponse, WidgetError> {
        let (latency, result) = {
            let mut inner = self.inner.lock().unwrap();
            inner.upsells.push(request.clone());
            let result = if inner.unreachable {
                Err(WidgetError::NotFound("connection refused".to_string()))
            } else {
                Ok(json(200, &inner.upsell_response))
            };
            (inner.latency, result)
        };
        pause(latency).await;
        result
    }
}
