//! Inputs and results of Admin API calls.

use rust_decimal::Decimal;

use codform_core::customer::Address;
use codform_core::pricing::Discount;
use codform_core::{OrderType, PlatformId};

/// One line of an order to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub variant_id: PlatformId,
    pub quantity: u32,
    /// Unit price before discounts.
    pub price: Decimal,
    pub title: String,
}

/// Who the order belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerInput {
    /// A customer found by email or phone.
    Existing(PlatformId),
    /// Create the customer from the submitted fields.
    New {
        first_name: String,
        last_name: String,
        email: Option<String>,
        phone: Option<String>,
        accepts_marketing: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingLine {
    pub code: String,
    pub title: String,
    pub price: Decimal,
}

/// Order-level discount, always sent as a fixed amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDiscount {
    pub title: String,
    pub amount: Decimal,
}

/// Everything needed to create an order or a draft order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub line_items: Vec<NewOrderLine>,
    pub customer: Option<CustomerInput>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub shipping_line: Option<ShippingLine>,
    pub discount: Option<OrderDiscount>,
    pub note: String,
    pub tags: String,
    pub send_receipt: bool,
}

impl NewOrder {
    /// The same order with every customer identifier removed and the given
    /// address used for shipping and billing.
    #[must_use]
    pub fn without_customer(&self, address: Address, note: String) -> Self {
        Self {
            customer: None,
            email: None,
            phone: None,
            shipping_address: Some(address.clone()),
            billing_address: Some(address),
            note,
            ..self.clone()
        }
    }
}

/// A created order or draft order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPlatformOrder {
    pub id: PlatformId,
    pub order_type: OrderType,
    /// Display name such as `#1001` or `#D12`.
    pub name: Option<String>,
    /// Customer-facing status page, orders only.
    pub status_url: Option<String>,
    /// Raw response body, kept in local order metadata.
    pub raw: serde_json::Value,
}

/// A variant of a product looked up by handle, with its current price.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ProductVariant {
    pub id: PlatformId,
    pub price: Decimal,
}

/// A line added to an existing order after checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsellLine {
    pub variant_id: PlatformId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub discount: Discount,
    pub title: String,
}

impl UpsellLine {
    /// Total reduction across the whole line.
    #[must_use]
    pub fn discount_amount(&self) -> Decimal {
        let gross = self.unit_price.saturating_mul(Decimal::from(self.quantity.max(1)));
        gross - self.discount.apply(gross)
    }
}
