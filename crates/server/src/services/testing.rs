//! In-memory store and platform for pipeline tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;

use codform_core::blocking::BlockingSettings;
use codform_core::customer::CustomerFields;
use codform_core::pricing::{ActiveOffer, PriceQuote, quote};
use codform_core::settings::ShopSettings;
use codform_core::{LocalOrderId, LocalOrderStatus, OrderType, PlatformId};

use super::platform::CommercePlatform;
use super::store::OrderStore;
use crate::db::RepositoryError;
use crate::models::{LocalOrder, NewLocalOrder, OrderMetadata, ShopSession};
use crate::shopify::{
    CreatedPlatformOrder, NewOrder, ProductVariant, ShopifyError, UpsellLine, ValidationErrors,
};

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, ShopSession>,
    settings: HashMap<String, ShopSettings>,
    blocking: Option<BlockingSettings>,
    orders: Vec<LocalOrder>,
    claimed_upsells: HashSet<(LocalOrderId, String)>,
    fail_inserts: bool,
}

/// Store backed by vectors. Ids start at 1.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

pub fn session(shop: &str) -> ShopSession {
    ShopSession {
        shop: shop.to_string(),
        access_token: SecretString::from("shpat_test"),
        scope: None,
    }
}

impl MemoryStore {
    pub fn connected(shop: &str) -> Self {
        let store = Self::default();
        store
            .inner
            .lock()
            .unwrap()
            .sessions
            .insert(shop.to_string(), session(shop));
        store
    }

    pub fn with_settings(self, shop: &str, settings: ShopSettings) -> Self {
        self.inner
            .lock()
            .unwrap()
            .settings
            .insert(shop.to_string(), settings);
        self
    }

    pub fn with_blocking(self, settings: BlockingSettings) -> Self {
        self.inner.lock().unwrap().blocking = Some(settings);
        self
    }

    pub fn failing_inserts(self) -> Self {
        self.inner.lock().unwrap().fail_inserts = true;
        self
    }

    /// Insert an already placed order for rate-limit tests.
    pub fn seed_order(&self, shop: &str, ip: Option<&str>, email: &str, created_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        let id = i32::try_from(inner.orders.len()).unwrap() + 1;
        inner.orders.push(LocalOrder {
            id: LocalOrderId::new(id),
            shop: shop.to_string(),
            status: LocalOrderStatus::Created,
            customer: CustomerFields {
                email: email.to_string(),
                ..CustomerFields::default()
            },
            shipping: None,
            line_items: Vec::new(),
            totals: zero_quote(),
            client_ip: ip.map(str::to_string),
            order_type: Some(OrderType::Order),
            platform_order_id: None,
            platform_order_number: None,
            note: None,
            metadata: OrderMetadata::default(),
            created_at,
            updated_at: created_at,
        });
    }

    pub fn is_claimed(&self, id: LocalOrderId, upsell_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .claimed_upsells
            .contains(&(id, upsell_id.to_string()))
    }

    pub fn orders(&self) -> Vec<LocalOrder> {
        self.inner.lock().unwrap().orders.clone()
    }

    pub fn order(&self, id: LocalOrderId) -> LocalOrder {
        self.orders().into_iter().find(|o| o.id == id).unwrap()
    }
}

fn zero_quote() -> PriceQuote {
    quote(Decimal::ZERO, 1, &ActiveOffer::None, Decimal::ZERO)
}

impl OrderStore for MemoryStore {
    async fn shop_session(&self, shop: &str) -> Result<Option<ShopSession>, RepositoryError> {
        Ok(self.inner.lock().unwrap().sessions.get(shop).cloned())
    }

    async fn shop_settings(&self, shop: &str) -> Result<ShopSettings, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .settings
            .get(shop)
            .cloned()
            .unwrap_or_default())
    }

    async fn blocking_settings(
        &self,
        _shop: &str,
    ) -> Result<Option<BlockingSettings>, RepositoryError> {
        Ok(self.inner.lock().unwrap().blocking.clone())
    }

    async fn count_recent_orders(
        &self,
        shop: &str,
        client_ip: Option<&str>,
        email: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .orders
            .iter()
            .filter(|o| o.shop == shop && o.created_at >= since)
            .filter(|o| {
                let ip_match = client_ip.is_some() && o.client_ip.as_deref() == client_ip;
                let email_match = email.is_some_and(|e| o.customer.email.to_lowercase() == e);
                ip_match || email_match
            })
            .count();
        Ok(i64::try_from(count).unwrap())
    }

    async fn insert_local_order(&self, order: &NewLocalOrder) -> Result<LocalOrder, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_inserts {
            return Err(RepositoryError::DataCorruption("insert refused".to_string()));
        }
        let id = i32::try_from(inner.orders.len()).unwrap() + 1;
        let now = Utc::now();
        let created = LocalOrder {
            id: LocalOrderId::new(id),
            shop: order.shop.clone(),
            status: LocalOrderStatus::Pending,
            customer: order.customer.clone(),
            shipping: order.shipping.clone(),
            line_items: order.line_items.clone(),
            totals: order.totals,
            client_ip: order.client_ip.clone(),
            order_type: None,
            platform_order_id: None,
            platform_order_number: None,
            note: None,
            metadata: order.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.orders.push(created.clone());
        Ok(created)
    }

    async fn update_local_order(&self, order: &LocalOrder) -> Result<LocalOrder, RepositoryError> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner
            .orders
            .iter_mut()
            .find(|o| o.id == order.id && o.shop == order.shop)
            .ok_or(RepositoryError::NotFound)?;
        *slot = order.clone();
        Ok(order.clone())
    }

    async fn local_order(
        &self,
        shop: &str,
        id: LocalOrderId,
    ) -> Result<Option<LocalOrder>, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .orders
            .iter()
            .find(|o| o.id == id && o.shop == shop)
            .cloned())
    }

    async fn claim_upsell(&self, id: LocalOrderId, upsell_id: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .claimed_upsells
            .insert((id, upsell_id.to_string())))
    }

    async fn release_upsell(&self, id: LocalOrderId, upsell_id: &str) -> Result<(), RepositoryError> {
        self.inner
            .lock()
            .unwrap()
            .claimed_upsells
            .remove(&(id, upsell_id.to_string()));
        Ok(())
    }
}

/// Scripted answer to an order or draft creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Created,
    /// 422 naming the customer email.
    RejectCustomer,
    /// 422 naming line items.
    RejectLines,
    /// 503 from the platform.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    VariantPrice(PlatformId),
    ProductVariants(String),
    FindCustomer,
    CreateOrder(NewOrder),
    CreateDraft(NewOrder),
    AppendToDraft(PlatformId, UpsellLine),
    AppendToOrder(PlatformId, UpsellLine),
}

#[derive(Default)]
struct PlatformInner {
    prices: HashMap<PlatformId, Decimal>,
    products: HashMap<String, Vec<ProductVariant>>,
    customer: Option<PlatformId>,
    replies: VecDeque<Reply>,
    fail_prices: bool,
    fail_appends: bool,
    calls: Vec<PlatformCall>,
    next_id: u64,
}

/// Platform that records calls and answers from a script.
/// Creation succeeds when the script is empty.
#[derive(Clone, Default)]
pub struct FakePlatform {
    inner: Arc<Mutex<PlatformInner>>,
}

impl FakePlatform {
    pub fn with_price(self, variant_id: &str, price: Decimal) -> Self {
        self.inner
            .lock()
            .unwrap()
            .prices
            .insert(PlatformId::new(variant_id), price);
        self
    }

    pub fn with_product(self, handle: &str, variants: &[(&str, Decimal)]) -> Self {
        let variants = variants
            .iter()
            .map(|(id, price)| ProductVariant {
                id: PlatformId::new(id),
                price: *price,
            })
            .collect();
        self.inner
            .lock()
            .unwrap()
            .products
            .insert(handle.to_string(), variants);
        self
    }

    /// Price and product lookups answer with a 503.
    pub fn failing_prices(self) -> Self {
        self.inner.lock().unwrap().fail_prices = true;
        self
    }

    pub fn with_customer(self, id: &str) -> Self {
        self.inner.lock().unwrap().customer = Some(PlatformId::new(id));
        self
    }

    pub fn replying(self, replies: &[Reply]) -> Self {
        self.inner.lock().unwrap().replies = replies.iter().copied().collect();
        self
    }

    pub fn failing_appends(self) -> Self {
        self.inner.lock().unwrap().fail_appends = true;
        self
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn created(&self) -> Vec<NewOrder> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::CreateOrder(order) | PlatformCall::CreateDraft(order) => Some(order),
                _ => None,
            })
            .collect()
    }

    fn create(&self, call: PlatformCall, order_type: OrderType) -> Result<CreatedPlatformOrder, ShopifyError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        match inner.replies.pop_front().unwrap_or(Reply::Created) {
            Reply::Created => {
                inner.next_id += 1;
                let id = 5000 + inner.next_id;
                let (name, status_url) = match order_type {
                    OrderType::Order => (
                        format!("#{}", 1000 + inner.next_id),
                        Some(format!("https://shop.test/orders/{id}/status")),
                    ),
                    OrderType::DraftOrder => (format!("#D{}", inner.next_id), None),
                };
                Ok(CreatedPlatformOrder {
                    id: PlatformId::from(id),
                    order_type,
                    name: Some(name),
                    status_url,
                    raw: serde_json::json!({ "id": id }),
                })
            }
            Reply::RejectCustomer => Err(ShopifyError::Validation(ValidationErrors::from_body(
                r#"{"errors":{"customer.email":["is invalid"]}}"#,
            ))),
            Reply::RejectLines => Err(ShopifyError::Validation(ValidationErrors::from_body(
                r#"{"errors":{"line_items":["must exist"]}}"#,
            ))),
            Reply::Unavailable => Err(unavailable()),
        }
    }

    fn append(&self, call: PlatformCall) -> Result<(), ShopifyError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if inner.fail_appends {
            Err(ShopifyError::UserError("Order cannot be edited".to_string()))
        } else {
            Ok(())
        }
    }
}

fn unavailable() -> ShopifyError {
    ShopifyError::UnexpectedStatus {
        status: 503,
        body: "unavailable".to_string(),
    }
}

impl CommercePlatform for FakePlatform {
    async fn variant_price(
        &self,
        _session: &ShopSession,
        variant_id: &PlatformId,
    ) -> Result<Option<Decimal>, ShopifyError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(PlatformCall::VariantPrice(variant_id.clone()));
        if inner.fail_prices {
            return Err(unavailable());
        }
        Ok(inner.prices.get(variant_id).copied())
    }

    async fn product_variants(
        &self,
        _session: &ShopSession,
        handle: &str,
    ) -> Result<Vec<ProductVariant>, ShopifyError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(PlatformCall::ProductVariants(handle.to_string()));
        if inner.fail_prices {
            return Err(unavailable());
        }
        Ok(inner.products.get(handle).cloned().unwrap_or_default())
    }

    async fn find_customer(
        &self,
        _session: &ShopSession,
        _email: Option<&str>,
        _phone: Option<&str>,
    ) -> Result<Option<PlatformId>, ShopifyError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(PlatformCall::FindCustomer);
        Ok(inner.customer.clone())
    }

    async fn create_order(
        &self,
        _session: &ShopSession,
        order: &NewOrder,
    ) -> Result<CreatedPlatformOrder, ShopifyError> {
        self.create(PlatformCall::CreateOrder(order.clone()), OrderType::Order)
    }

    async fn create_draft_order(
        &self,
        _session: &ShopSession,
        order: &NewOrder,
    ) -> Result<CreatedPlatformOrder, ShopifyError> {
        self.create(PlatformCall::CreateDraft(order.clone()), OrderType::DraftOrder)
    }

    async fn append_to_draft_order(
        &self,
        _session: &ShopSession,
        draft_id: &PlatformId,
        line: &UpsellLine,
    ) -> Result<(), ShopifyError> {
        self.append(PlatformCall::AppendToDraft(draft_id.clone(), line.clone()))
    }

    async fn append_to_order(
        &self,
        _session: &ShopSession,
        order_id: &PlatformId,
        line: &UpsellLine,
    ) -> Result<(), ShopifyError> {
        self.append(PlatformCall::AppendToOrder(order_id.clone(), line.clone()))
    }
}
