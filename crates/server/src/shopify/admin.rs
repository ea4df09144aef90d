//! Shopify Admin API client implementation.
//!
//! REST for orders, drafts, customers and variants; JSON GraphQL for the
//! order-edit mutations. Variant prices are cached with `moka` (5-minute TTL).

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use codform_core::pricing::DiscountType;
use codform_core::{OrderType, PlatformId, format_amount};

use super::types::{
    CreatedPlatformOrder, CustomerInput, NewOrder, NewOrderLine, ProductVariant, UpsellLine,
};
use super::{GraphQLError, ShopifyError, ValidationErrors};
use crate::config::ShopifyConfig;
use crate::models::ShopSession;

/// Draft line item keys carried over when the line list is rewritten.
const DRAFT_LINE_KEYS: &[&str] = &[
    "variant_id",
    "quantity",
    "title",
    "price",
    "applied_discount",
    "properties",
    "custom",
    "taxable",
    "requires_shipping",
];

// =============================================================================
// ShopifyClient
// =============================================================================

/// Client for the Shopify Admin API.
///
/// One client serves every shop; each call takes the shop's session.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    api_version: String,
    prices: Cache<(String, PlatformId), Decimal>,
}

impl ShopifyClient {
    /// Create a new Admin API client.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized.
    #[must_use]
    pub fn new(config: &ShopifyConfig) -> Self {
        let prices = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            inner: Arc::new(ShopifyClientInner {
                client,
                api_version: config.api_version.clone(),
                prices,
            }),
        }
    }

    fn endpoint(&self, shop: &str, path: &str) -> Result<Url, ShopifyError> {
        admin_url(shop, &self.inner.api_version, path)
    }

    /// Send one Admin API request and decode the JSON body.
    async fn send(
        &self,
        session: &ShopSession,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, ShopifyError> {
        let mut request = self
            .inner
            .client
            .request(method, url)
            .header("X-Shopify-Access-Token", session.access_token.expose_secret())
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split('.').next())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map_or(1, |secs| secs.max(1));
            return Err(ShopifyError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;
        check_status(status, &response_text)?;

        if response_text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse Shopify Admin response"
            );
            ShopifyError::Parse(e)
        })
    }

    /// Execute a GraphQL operation and return its `data` object.
    async fn graphql(
        &self,
        session: &ShopSession,
        query: &str,
        variables: Value,
    ) -> Result<Value, ShopifyError> {
        let url = self.endpoint(&session.shop, "graphql.json")?;
        let body = json!({ "query": query, "variables": variables });
        let response = self.send(session, Method::POST, url, Some(&body)).await?;
        graphql_data(response)
    }

    // =========================================================================
    // Variants and customers
    // =========================================================================

    /// Get the current price of a variant. `None` when the variant does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop, variant_id = %variant_id))]
    pub async fn variant_price(
        &self,
        session: &ShopSession,
        variant_id: &PlatformId,
    ) -> Result<Option<Decimal>, ShopifyError> {
        #[derive(Deserialize)]
        struct VariantEnvelope {
            variant: VariantPayload,
        }
        #[derive(Deserialize)]
        struct VariantPayload {
            price: Decimal,
        }

        let cache_key = (session.shop.clone(), variant_id.clone());
        if let Some(price) = self.inner.prices.get(&cache_key).await {
            debug!("Cache hit for variant price");
            return Ok(Some(price));
        }

        let url = self.endpoint(&session.shop, &format!("variants/{variant_id}.json"))?;
        let response = match self.send(session, Method::GET, url, None).await {
            Ok(response) => response,
            Err(ShopifyError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let envelope: VariantEnvelope = serde_json::from_value(response)?;
        self.inner
            .prices
            .insert(cache_key, envelope.variant.price)
            .await;
        Ok(Some(envelope.variant.price))
    }

    /// Variants of the product with the given handle. Empty when no product
    /// has that handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop, handle = %handle))]
    pub async fn product_variants(
        &self,
        session: &ShopSession,
        handle: &str,
    ) -> Result<Vec<ProductVariant>, ShopifyError> {
        let mut url = self.endpoint(&session.shop, "products.json")?;
        url.query_pairs_mut()
            .append_pair("handle", handle)
            .append_pair("fields", "id,variants");
        let response = self.send(session, Method::GET, url, None).await?;
        product_variants_from(response)
    }

    /// Find a customer by email, then by phone.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session, email, phone), fields(shop = %session.shop))]
    pub async fn find_customer(
        &self,
        session: &ShopSession,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<PlatformId>, ShopifyError> {
        let queries = email
            .map(|e| format!("email:{e}"))
            .into_iter()
            .chain(phone.map(|p| format!("phone:{p}")));

        for query in queries {
            let mut url = self.endpoint(&session.shop, "customers/search.json")?;
            url.query_pairs_mut()
                .append_pair("query", &query)
                .append_pair("limit", "1")
                .append_pair("fields", "id");

            let response = self.send(session, Method::GET, url, None).await?;
            if let Some(id) = response
                .get("customers")
                .and_then(Value::as_array)
                .and_then(|customers| customers.first())
                .and_then(|customer| customer.get("id"))
                .and_then(platform_id)
            {
                debug!(customer_id = %id, "Found existing customer");
                return Ok(Some(id));
            }
        }

        Ok(None)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Create an order with financial status `pending`.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Validation` when the payload is rejected.
    #[instrument(skip(self, session, order), fields(shop = %session.shop))]
    pub async fn create_order(
        &self,
        session: &ShopSession,
        order: &NewOrder,
    ) -> Result<CreatedPlatformOrder, ShopifyError> {
        let url = self.endpoint(&session.shop, "orders.json")?;
        let response = self
            .send(session, Method::POST, url, Some(&order_body(order)))
            .await?;
        parse_created(response, OrderType::Order)
    }

    /// Create a draft order.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Validation` when the payload is rejected.
    #[instrument(skip(self, session, order), fields(shop = %session.shop))]
    pub async fn create_draft_order(
        &self,
        session: &ShopSession,
        order: &NewOrder,
    ) -> Result<CreatedPlatformOrder, ShopifyError> {
        let url = self.endpoint(&session.shop, "draft_orders.json")?;
        let response = self
            .send(session, Method::POST, url, Some(&draft_order_body(order)))
            .await?;
        parse_created(response, OrderType::DraftOrder)
    }

    /// Append a line to a draft order by rewriting its line list.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft cannot be read or updated.
    #[instrument(skip(self, session, line), fields(shop = %session.shop, draft_id = %draft_id))]
    pub async fn append_to_draft_order(
        &self,
        session: &ShopSession,
        draft_id: &PlatformId,
        line: &UpsellLine,
    ) -> Result<(), ShopifyError> {
        let url = self.endpoint(&session.shop, &format!("draft_orders/{draft_id}.json"))?;
        let current = self.send(session, Method::GET, url.clone(), None).await?;
        let existing = current
            .get("draft_order")
            .and_then(|d| d.get("line_items"))
            .and_then(Value::as_array)
            .ok_or_else(|| ShopifyError::NotFound(format!("draft order {draft_id}")))?;

        let body = draft_update_body(draft_id, existing, line);
        self.send(session, Method::PUT, url, Some(&body)).await?;
        Ok(())
    }

    /// Append a line to a placed order through an order edit.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` when any edit step is refused.
    #[instrument(skip(self, session, line), fields(shop = %session.shop, order_id = %order_id))]
    pub async fn append_to_order(
        &self,
        session: &ShopSession,
        order_id: &PlatformId,
        line: &UpsellLine,
    ) -> Result<(), ShopifyError> {
        let begin = self
            .graphql(
                session,
                ORDER_EDIT_BEGIN,
                json!({ "id": order_id.to_gid("Order") }),
            )
            .await?;
        let begin = mutation_payload(&begin, "orderEditBegin")?;
        let calculated_id = begin
            .pointer("/calculatedOrder/id")
            .and_then(Value::as_str)
            .ok_or_else(|| ShopifyError::UserError("order edit did not start".to_string()))?
            .to_string();
        let currency = begin
            .pointer("/calculatedOrder/originalOrder/currencyCode")
            .and_then(Value::as_str)
            .unwrap_or("USD")
            .to_string();

        let added = self
            .graphql(
                session,
                ORDER_EDIT_ADD_VARIANT,
                json!({
                    "id": calculated_id,
                    "variantId": line.variant_id.to_gid("ProductVariant"),
                    "quantity": line.quantity.max(1),
                }),
            )
            .await?;
        let added = mutation_payload(&added, "orderEditAddVariant")?;

        if let Some(discount) = edit_discount_input(line, &currency) {
            let line_item_id = added
                .pointer("/calculatedLineItem/id")
                .and_then(Value::as_str)
                .ok_or_else(|| ShopifyError::UserError("added line has no id".to_string()))?
                .to_string();
            let discounted = self
                .graphql(
                    session,
                    ORDER_EDIT_ADD_DISCOUNT,
                    json!({
                        "id": calculated_id,
                        "lineItemId": line_item_id,
                        "discount": discount,
                    }),
                )
                .await?;
            mutation_payload(&discounted, "orderEditAddLineItemDiscount")?;
        }

        let committed = self
            .graphql(
                session,
                ORDER_EDIT_COMMIT,
                json!({
                    "id": calculated_id,
                    "notifyCustomer": false,
                    "staffNote": format!("Post-purchase upsell: {}", line.title),
                }),
            )
            .await?;
        mutation_payload(&committed, "orderEditCommit")?;
        Ok(())
    }
}

// =============================================================================
// GraphQL documents
// =============================================================================

const ORDER_EDIT_BEGIN: &str = r"
mutation orderEditBegin($id: ID!) {
  orderEditBegin(id: $id) {
    calculatedOrder { id originalOrder { currencyCode } }
    userErrors { field message }
  }
}";

const ORDER_EDIT_ADD_VARIANT: &str = r"
mutation orderEditAddVariant($id: ID!, $variantId: ID!, $quantity: Int!) {
  orderEditAddVariant(id: $id, variantId: $variantId, quantity: $quantity, allowDuplicates: true) {
    calculatedLineItem { id }
    userErrors { field message }
  }
}";

const ORDER_EDIT_ADD_DISCOUNT: &str = r"
mutation orderEditAddLineItemDiscount($id: ID!, $lineItemId: ID!, $discount: OrderEditAppliedDiscountInput!) {
  orderEditAddLineItemDiscount(id: $id, lineItemId: $lineItemId, discount: $discount) {
    addedDiscountStagedChange { id }
    userErrors { field message }
  }
}";

const ORDER_EDIT_COMMIT: &str = r"
mutation orderEditCommit($id: ID!, $notifyCustomer: Boolean, $staffNote: String) {
  orderEditCommit(id: $id, notifyCustomer: $notifyCustomer, staffNote: $staffNote) {
    order { id }
    userErrors { field message }
  }
}";

// =============================================================================
// Helpers
// =============================================================================

/// Build an Admin API URL, rejecting shop values that are not bare hostnames.
fn admin_url(shop: &str, api_version: &str, path: &str) -> Result<Url, ShopifyError> {
    let shop = shop.trim();
    let valid = !shop.is_empty()
        && shop
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !valid {
        return Err(ShopifyError::InvalidShop(shop.to_string()));
    }
    Url::parse(&format!("https://{shop}/admin/api/{api_version}/{path}"))
        .map_err(|e| ShopifyError::InvalidShop(format!("{shop}: {e}")))
}

fn check_status(status: StatusCode, body: &str) -> Result<(), ShopifyError> {
    if status.is_success() {
        return Ok(());
    }
    let snippet = || body.chars().take(200).collect::<String>();
    match status {
        StatusCode::UNPROCESSABLE_ENTITY => {
            Err(ShopifyError::Validation(ValidationErrors::from_body(body)))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ShopifyError::Unauthorized),
        StatusCode::NOT_FOUND => Err(ShopifyError::NotFound(snippet())),
        _ => {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Shopify API returned non-success status"
            );
            Err(ShopifyError::UnexpectedStatus {
                status: status.as_u16(),
                body: snippet(),
            })
        }
    }
}

fn graphql_data(response: Value) -> Result<Value, ShopifyError> {
    if let Some(errors) = response.get("errors")
        && errors.as_array().is_some_and(|e| !e.is_empty())
    {
        let errors: Vec<GraphQLError> = serde_json::from_value(errors.clone())?;
        return Err(ShopifyError::GraphQL(errors));
    }
    response
        .get("data")
        .cloned()
        .filter(|data| !data.is_null())
        .ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                path: vec![],
            }])
        })
}

/// Variants of the first product in a `products.json` response.
fn product_variants_from(response: Value) -> Result<Vec<ProductVariant>, ShopifyError> {
    #[derive(Deserialize)]
    struct ProductsEnvelope {
        #[serde(default)]
        products: Vec<ProductPayload>,
    }
    #[derive(Deserialize)]
    struct ProductPayload {
        #[serde(default)]
        variants: Vec<ProductVariant>,
    }

    let envelope: ProductsEnvelope = serde_json::from_value(response)?;
    Ok(envelope
        .products
        .into_iter()
        .next()
        .map(|product| product.variants)
        .unwrap_or_default())
}

/// Extract a mutation payload, turning `userErrors` into an error.
fn mutation_payload<'a>(data: &'a Value, name: &str) -> Result<&'a Value, ShopifyError> {
    let payload = data
        .get(name)
        .filter(|p| !p.is_null())
        .ok_or_else(|| ShopifyError::UserError(format!("{name} returned no payload")))?;

    let messages: Vec<String> = payload
        .get("userErrors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if messages.is_empty() {
        Ok(payload)
    } else {
        Err(ShopifyError::UserError(format!(
            "{name}: {}",
            messages.join("; ")
        )))
    }
}

/// Numeric ids go out as JSON numbers, anything else as a string.
fn id_value(id: &PlatformId) -> Value {
    id.as_u64().map_or_else(|| json!(id.as_str()), |n| json!(n))
}

fn platform_id(value: &Value) -> Option<PlatformId> {
    match value {
        Value::Number(n) => n.as_u64().map(PlatformId::from),
        Value::String(s) if !s.trim().is_empty() => Some(PlatformId::new(s)),
        _ => None,
    }
}

fn line_item_json(line: &NewOrderLine) -> Value {
    json!({
        "variant_id": id_value(&line.variant_id),
        "quantity": line.quantity,
        "price": format_amount(line.price),
    })
}

fn customer_json(customer: &CustomerInput) -> Value {
    match customer {
        CustomerInput::Existing(id) => json!({ "id": id_value(id) }),
        CustomerInput::New {
            first_name,
            last_name,
            email,
            phone,
            accepts_marketing,
        } => {
            let mut customer = json!({
                "first_name": first_name,
                "last_name": last_name,
                "accepts_marketing": accepts_marketing,
            });
            if let Some(email) = email {
                customer["email"] = json!(email);
            }
            if let Some(phone) = phone {
                customer["phone"] = json!(phone);
            }
            customer
        }
    }
}

/// REST body for `POST orders.json`.
pub(crate) fn order_body(order: &NewOrder) -> Value {
    let mut body = json!({
        "line_items": order.line_items.iter().map(line_item_json).collect::<Vec<_>>(),
        "financial_status": "pending",
        "inventory_behaviour": "decrement_obeying_policy",
        "send_receipt": order.send_receipt,
        "send_fulfillment_receipt": false,
        "note": order.note,
        "tags": order.tags,
    });

    if let Some(customer) = &order.customer {
        body["customer"] = customer_json(customer);
        if let CustomerInput::New {
            accepts_marketing, ..
        } = customer
        {
            body["buyer_accepts_marketing"] = json!(accepts_marketing);
        }
    }
    if let Some(email) = &order.email {
        body["email"] = json!(email);
    }
    if let Some(phone) = &order.phone {
        body["phone"] = json!(phone);
    }
    if let Some(address) = &order.shipping_address {
        body["shipping_address"] = json!(address);
    }
    if let Some(address) = &order.billing_address {
        body["billing_address"] = json!(address);
    }
    if let Some(shipping) = &order.shipping_line {
        body["shipping_lines"] = json!([{
            "code": shipping.code,
            "title": shipping.title,
            "price": format_amount(shipping.price),
        }]);
    }
    if let Some(discount) = &order.discount {
        body["discount_codes"] = json!([{
            "code": discount.title,
            "amount": format_amount(discount.amount),
            "type": "fixed_amount",
        }]);
    }

    json!({ "order": body })
}

/// REST body for `POST draft_orders.json`.
pub(crate) fn draft_order_body(order: &NewOrder) -> Value {
    let mut body = json!({
        "line_items": order.line_items.iter().map(line_item_json).collect::<Vec<_>>(),
        "note": order.note,
        "tags": order.tags,
        "use_customer_default_address": false,
    });

    if let Some(CustomerInput::Existing(id)) = &order.customer {
        body["customer"] = json!({ "id": id_value(id) });
    }
    if let Some(email) = &order.email {
        body["email"] = json!(email);
    }
    if let Some(address) = &order.shipping_address {
        body["shipping_address"] = json!(address);
    }
    if let Some(address) = &order.billing_address {
        body["billing_address"] = json!(address);
    }
    if let Some(shipping) = &order.shipping_line {
        body["shipping_line"] = json!({
            "title": shipping.title,
            "price": format_amount(shipping.price),
            "custom": true,
        });
    }
    if let Some(discount) = &order.discount {
        body["applied_discount"] = json!({
            "title": discount.title,
            "description": discount.title,
            "value_type": "fixed_amount",
            "value": format_amount(discount.amount),
            "amount": format_amount(discount.amount),
        });
    }

    json!({ "draft_order": body })
}

/// REST body for `PUT draft_orders/{id}.json` with one extra line.
pub(crate) fn draft_update_body(draft_id: &PlatformId, existing: &[Value], line: &UpsellLine) -> Value {
    let mut line_items: Vec<Value> = existing
        .iter()
        .map(|item| {
            let kept = item
                .as_object()
                .map(|fields| {
                    fields
                        .iter()
                        .filter(|(key, value)| {
                            DRAFT_LINE_KEYS.contains(&key.as_str()) && !value.is_null()
                        })
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect::<serde_json::Map<_, _>>()
                })
                .unwrap_or_default();
            Value::Object(kept)
        })
        .collect();

    let mut added = json!({
        "variant_id": id_value(&line.variant_id),
        "quantity": line.quantity.max(1),
        "properties": [{ "name": "_upsell", "value": "true" }],
    });
    if line.discount.is_effective() {
        let (value_type, value) = match line.discount.kind {
            DiscountType::Percentage => ("percentage", line.discount.value.to_string()),
            DiscountType::FixedAmount | DiscountType::None => {
                ("fixed_amount", format_amount(line.discount.value))
            }
        };
        added["applied_discount"] = json!({
            "title": "Upsell",
            "description": line.title,
            "value_type": value_type,
            "value": value,
            "amount": format_amount(line.discount_amount()),
        });
    }
    line_items.push(added);

    json!({
        "draft_order": {
            "id": id_value(draft_id),
            "line_items": line_items,
        }
    })
}

/// Discount input for `orderEditAddLineItemDiscount`, `None` when there is nothing to apply.
pub(crate) fn edit_discount_input(line: &UpsellLine, currency: &str) -> Option<Value> {
    if !line.discount.is_effective() {
        return None;
    }
    match line.discount.kind {
        DiscountType::Percentage => {
            let percent = line
                .discount
                .value
                .min(Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or_default();
            Some(json!({ "description": "Upsell", "percentValue": percent }))
        }
        DiscountType::FixedAmount => {
            let per_unit = line.discount_amount() / Decimal::from(line.quantity.max(1));
            Some(json!({
                "description": "Upsell",
                "fixedValue": {
                    "amount": format_amount(per_unit),
                    "currencyCode": currency,
                }
            }))
        }
        DiscountType::None => None,
    }
}

/// Read the created order or draft out of a REST response.
fn parse_created(response: Value, order_type: OrderType) -> Result<CreatedPlatformOrder, ShopifyError> {
    let key = match order_type {
        OrderType::Order => "order",
        OrderType::DraftOrder => "draft_order",
    };
    let created = response
        .get(key)
        .ok_or_else(|| ShopifyError::UserError(format!("response has no {key}")))?;
    let id = created
        .get("id")
        .and_then(platform_id)
        .ok_or_else(|| ShopifyError::UserError(format!("{key} has no id")))?;
    let name = created
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);
    let status_url = created
        .get("order_status_url")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(CreatedPlatformOrder {
        id,
        order_type,
        name,
        status_url,
        raw: response,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shopify::types::{OrderDiscount, ShippingLine};
    use codform_core::customer::Address;
    use codform_core::pricing::Discount;

    #[test]
    fn test_product_variants_from_response() {
        let variants = product_variants_from(json!({
            "products": [{
                "id": 900,
                "variants": [
                    {"id": 901, "price": "20.00"},
                    {"id": 902, "price": "30.00"}
                ]
            }]
        }))
        .unwrap();
        assert_eq!(
            variants,
            vec![
                ProductVariant {
                    id: PlatformId::new("901"),
                    price: Decimal::new(2000, 2),
                },
                ProductVariant {
                    id: PlatformId::new("902"),
                    price: Decimal::new(3000, 2),
                },
            ]
        );
        assert!(product_variants_from(json!({"products": []})).unwrap().is_empty());
    }

    fn order() -> NewOrder {
        NewOrder {
            line_items: vec![NewOrderLine {
                variant_id: PlatformId::new("gid://shopify/ProductVariant/42"),
                quantity: 3,
                price: Decimal::new(10000, 2),
                title: "Blender".to_string(),
            }],
            customer: Some(CustomerInput::New {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: Some("ada@example.com".to_string()),
                phone: None,
                accepts_marketing: true,
            }),
            email: Some("ada@example.com".to_string()),
            phone: None,
            shipping_address: Some(Address {
                first_name: "Ada".to_string(),
                address1: "1 Main St".to_string(),
                country: "US".to_string(),
                ..Address::default()
            }),
            billing_address: None,
            shipping_line: Some(ShippingLine {
                code: "std".to_string(),
                title: "Standard".to_string(),
                price: Decimal::new(10, 0),
            }),
            discount: Some(OrderDiscount {
                title: "Buy 3".to_string(),
                amount: Decimal::new(60, 0),
            }),
            note: "note".to_string(),
            tags: "cod".to_string(),
            send_receipt: false,
        }
    }

    #[test]
    fn test_admin_url_validates_shop() {
        let url = admin_url("demo.myshopify.com", "2026-01", "orders.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://demo.myshopify.com/admin/api/2026-01/orders.json"
        );
        assert!(matches!(
            admin_url("evil.com/x?", "2026-01", "orders.json"),
            Err(ShopifyError::InvalidShop(_))
        ));
        assert!(admin_url("  ", "2026-01", "orders.json").is_err());
    }

    #[test]
    fn test_order_body() {
        let body = order_body(&order());
        let order = &body["order"];
        assert_eq!(order["line_items"][0]["variant_id"], 42);
        assert_eq!(order["line_items"][0]["price"], "100.00");
        assert_eq!(order["financial_status"], "pending");
        assert_eq!(order["customer"]["first_name"], "Ada");
        assert_eq!(order["buyer_accepts_marketing"], true);
        assert_eq!(order["shipping_lines"][0]["price"], "10.00");
        assert_eq!(order["discount_codes"][0]["amount"], "60.00");
        assert_eq!(order["discount_codes"][0]["type"], "fixed_amount");
        assert_eq!(order["shipping_address"]["address1"], "1 Main St");
        assert!(order.get("phone").is_none());
    }

    #[test]
    fn test_order_body_without_customer() {
        let stripped = order().without_customer(Address::default(), "fallback".to_string());
        let body = order_body(&stripped);
        assert!(body["order"].get("customer").is_none());
        assert!(body["order"].get("email").is_none());
        assert_eq!(body["order"]["note"], "fallback");
    }

    #[test]
    fn test_draft_order_body() {
        let mut order = order();
        order.customer = Some(CustomerInput::Existing(PlatformId::new("77")));
        let body = draft_order_body(&order);
        let draft = &body["draft_order"];
        assert_eq!(draft["customer"]["id"], 77);
        assert_eq!(draft["applied_discount"]["value_type"], "fixed_amount");
        assert_eq!(draft["applied_discount"]["amount"], "60.00");
        assert_eq!(draft["shipping_line"]["title"], "Standard");
    }

    fn upsell(discount: Discount) -> UpsellLine {
        UpsellLine {
            variant_id: PlatformId::new("301"),
            quantity: 1,
            unit_price: Decimal::new(2000, 2),
            discount,
            title: "Socks".to_string(),
        }
    }

    #[test]
    fn test_draft_update_body_keeps_existing_lines() {
        let existing = vec![json!({
            "id": 1,
            "variant_id": 42,
            "quantity": 3,
            "price": "100.00",
            "admin_graphql_api_id": "gid://shopify/DraftOrderLineItem/1",
            "applied_discount": null
        })];
        let body = draft_update_body(
            &PlatformId::new("9"),
            &existing,
            &upsell(Discount::percentage(Decimal::new(15, 0))),
        );
        let lines = body["draft_order"]["line_items"].as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["variant_id"], 42);
        assert!(lines[0].get("admin_graphql_api_id").is_none());
        assert!(lines[0].get("applied_discount").is_none());
        assert_eq!(lines[1]["variant_id"], 301);
        assert_eq!(lines[1]["applied_discount"]["value_type"], "percentage");
        assert_eq!(lines[1]["applied_discount"]["amount"], "3.00");
    }

    #[test]
    fn test_edit_discount_input() {
        assert!(edit_discount_input(&upsell(Discount::NONE), "USD").is_none());

        let pct = edit_discount_input(&upsell(Discount::percentage(Decimal::new(15, 0))), "USD")
            .unwrap();
        assert_eq!(pct["percentValue"], 15.0);

        let fixed =
            edit_discount_input(&upsell(Discount::fixed(Decimal::new(5, 0))), "EUR").unwrap();
        assert_eq!(fixed["fixedValue"]["amount"], "5.00");
        assert_eq!(fixed["fixedValue"]["currencyCode"], "EUR");
    }

    #[test]
    fn test_parse_created_order() {
        let created = parse_created(
            json!({"order": {"id": 555, "name": "#1001", "order_status_url": "https://shop/status"}}),
            OrderType::Order,
        )
        .unwrap();
        assert_eq!(created.id, PlatformId::new("555"));
        assert_eq!(created.name.as_deref(), Some("#1001"));
        assert_eq!(created.status_url.as_deref(), Some("https://shop/status"));

        let err = parse_created(json!({"errors": "nope"}), OrderType::DraftOrder).unwrap_err();
        assert!(matches!(err, ShopifyError::UserError(_)));
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(StatusCode::CREATED, "{}").is_ok());
        let err = check_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"errors":{"email":["is invalid"]}}"#,
        )
        .unwrap_err();
        assert!(err.rejects_customer());
        assert!(matches!(
            check_status(StatusCode::UNAUTHORIZED, ""),
            Err(ShopifyError::Unauthorized)
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, "down"),
            Err(ShopifyError::UnexpectedStatus { status: 502, .. })
        ));
    }

    #[test]
    fn test_mutation_payload_user_errors() {
        let data = json!({"orderEditBegin": {"calculatedOrder": null, "userErrors": [{"field": ["id"], "message": "Order cannot be edited"}]}});
        let err = mutation_payload(&data, "orderEditBegin").unwrap_err();
        assert_eq!(
            err.to_string(),
            "User error: orderEditBegin: Order cannot be edited"
        );

        let data = json!({"orderEditCommit": {"order": {"id": "gid://shopify/Order/1"}, "userErrors": []}});
        assert!(mutation_payload(&data, "orderEditCommit").is_ok());
    }

    #[test]
    fn test_graphql_data_errors() {
        let err = graphql_data(json!({"errors": [{"message": "Throttled"}]})).unwrap_err();
        assert_eq!(err.to_string(), "GraphQL errors: Throttled");
        assert!(graphql_data(json!({"data": {"x": 1}})).is_ok());
        assert!(graphql_data(json!({"data": null})).is_err());
    }
}
