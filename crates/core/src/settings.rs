//! Per-shop order settings and the configuration payload served to the
//! widget.

use serde::{Deserialize, Serialize};

use crate::form::FormConfiguration;
use crate::offers::OfferCatalog;
use crate::shipping::ShippingRate;

/// What happens after a successful order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RedirectType {
    /// The platform's order status page.
    #[default]
    Default,
    /// A merchant-chosen URL.
    Custom,
    /// A WhatsApp chat with the merchant, prefilled with the order summary.
    Whatsapp,
    /// Stay on the page and show a thank-you message.
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RedirectSettings {
    #[serde(rename = "type")]
    pub kind: RedirectType,
    pub url: Option<String>,
    pub whatsapp_number: Option<String>,
    pub thank_you_message: Option<String>,
}

/// Where the shopper goes once the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectDescriptor {
    #[serde(rename = "type")]
    pub kind: RedirectType,
    #[serde(rename = "redirectURL", default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thank_you_message: Option<String>,
}

pub const DEFAULT_THANK_YOU_MESSAGE: &str = "Thank you! Your order has been received.";

impl RedirectSettings {
    /// Build the descriptor for a finished order.
    ///
    /// `status_url` is the platform's order status page (absent for draft
    /// orders), `summary` the text prefilled into a WhatsApp chat. Settings
    /// that lack the URL or number they need fall back to the default
    /// behaviour.
    #[must_use]
    pub fn descriptor(&self, status_url: Option<&str>, summary: &str) -> RedirectDescriptor {
        let message = self
            .thank_you_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_THANK_YOU_MESSAGE)
            .to_string();

        let default = || RedirectDescriptor {
            kind: RedirectType::Default,
            redirect_url: Some(status_url.unwrap_or("/").to_string()),
            thank_you_message: Some(message.clone()),
        };

        match self.kind {
            RedirectType::Default => default(),
            RedirectType::Custom => match self.url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => RedirectDescriptor {
                    kind: RedirectType::Custom,
                    redirect_url: Some(url.to_string()),
                    thank_you_message: Some(message.clone()),
                },
                _ => default(),
            },
            RedirectType::Whatsapp => {
                let digits: String = self
                    .whatsapp_number
                    .as_deref()
                    .unwrap_or_default()
                    .chars()
                    .filter(char::is_ascii_digit)
                    .collect();
                if digits.is_empty() {
                    default()
                } else {
                    RedirectDescriptor {
                        kind: RedirectType::Whatsapp,
                        redirect_url: Some(format!(
                            "https://wa.me/{digits}?text={}",
                            urlencoding::encode(summary)
                        )),
                        thank_you_message: Some(message.clone()),
                    }
                }
            }
            RedirectType::Message => RedirectDescriptor {
                kind: RedirectType::Message,
                redirect_url: None,
                thank_you_message: Some(message.clone()),
            },
        }
    }
}

/// How submitted orders are written to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderSettings {
    /// Create draft orders instead of real orders.
    pub save_as_draft: bool,
    pub redirect: RedirectSettings,
    /// Tags added to every platform order.
    pub tags: Vec<String>,
    /// Ask the platform to email its own receipt.
    pub send_receipt: bool,
    /// ISO country code used when the form has no country field.
    pub default_country: String,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            save_as_draft: false,
            redirect: RedirectSettings::default(),
            tags: vec!["cod".to_string()],
            send_receipt: false,
            default_country: "US".to_string(),
        }
    }
}

impl OrderSettings {
    /// Tags as the comma-separated string the platform expects.
    #[must_use]
    pub fn tag_list(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Everything the widget needs for one shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ShopSettings {
    pub form: FormConfiguration,
    pub shipping: Vec<ShippingRate>,
    pub offers: OfferCatalog,
    pub order_settings: OrderSettings,
}
