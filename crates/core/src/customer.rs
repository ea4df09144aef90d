//! Customer fields as submitted by the checkout form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Email;

/// Customer data collected by the form.
///
/// Every value is free text straight from the shopper; call
/// [`CustomerFields::normalized`] before using any of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomerFields {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub address2: String,
    pub city: String,
    pub province: String,
    pub zip: String,
    pub country: String,
    pub note: String,
    pub subscribe: bool,
}

/// A postal address, as sent to the commerce platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address2: String,
    pub city: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub province: String,
    pub zip: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Form input names that map onto [`CustomerFields`]. Any other input is a
/// custom field and travels in the note.
pub const CUSTOMER_KEYS: [&str; 11] = [
    "firstName", "lastName", "phone", "email", "address", "address2", "city", "province", "zip",
    "country", "note",
];

/// Placeholder for missing address parts in the no-customer fallback.
pub const ADDRESS_PLACEHOLDER: &str = "N/A";

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl CustomerFields {
    /// Trim every field and fill in placeholder names.
    ///
    /// When both names are empty the first name becomes a single space and
    /// the last name `#<unix millis>`, so the platform still accepts the
    /// order and the merchant can tell placeholder names apart.
    #[must_use]
    pub fn normalized(&self, now: DateTime<Utc>) -> Self {
        let mut first_name = collapse_whitespace(&self.first_name);
        let mut last_name = collapse_whitespace(&self.last_name);
        if first_name.is_empty() && last_name.is_empty() {
            first_name = " ".to_string();
            last_name = format!("#{}", now.timestamp_millis());
        }

        Self {
            first_name,
            last_name,
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            address: collapse_whitespace(&self.address),
            address2: collapse_whitespace(&self.address2),
            city: collapse_whitespace(&self.city),
            province: collapse_whitespace(&self.province),
            zip: self.zip.trim().to_uppercase(),
            country: self.country.trim().to_string(),
            note: self.note.trim().to_string(),
            subscribe: self.subscribe,
        }
    }

    /// The value submitted under a form input name, or `None` for custom
    /// inputs that do not map onto a customer field.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        let value = match name {
            "firstName" => &self.first_name,
            "lastName" => &self.last_name,
            "phone" => &self.phone,
            "email" => &self.email,
            "address" => &self.address,
            "address2" => &self.address2,
            "city" => &self.city,
            "province" => &self.province,
            "zip" => &self.zip,
            "country" => &self.country,
            "note" => &self.note,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// "First Last", trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// The email, when it parses.
    #[must_use]
    pub fn valid_email(&self) -> Option<Email> {
        non_empty(&self.email).and_then(|e| Email::parse(e).ok())
    }

    /// The phone, when one was given.
    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        non_empty(&self.phone)
    }

    /// Shipping address built from the submitted fields.
    #[must_use]
    pub fn address(&self, default_country: &str) -> Address {
        Address {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            address1: self.address.clone(),
            address2: self.address2.clone(),
            city: self.city.clone(),
            province: self.province.clone(),
            zip: self.zip.clone(),
            country: non_empty(&self.country)
                .unwrap_or(default_country)
                .to_string(),
            phone: self.phone().map(str::to_string),
        }
    }

    /// Address used when the platform rejected the customer data: no phone,
    /// and empty required parts replaced by a placeholder.
    #[must_use]
    pub fn fallback_address(&self, default_country: &str) -> Address {
        let or_placeholder =
            |value: &str| non_empty(value).unwrap_or(ADDRESS_PLACEHOLDER).to_string();
        Address {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            address1: or_placeholder(&self.address),
            address2: self.address2.clone(),
            city: or_placeholder(&self.city),
            province: self.province.clone(),
            zip: or_placeholder(&self.zip),
            country: non_empty(&self.country)
                .unwrap_or(default_country)
                .to_string(),
            phone: None,
        }
    }

    /// One-line address for notes and logs.
    #[must_use]
    pub fn address_line(&self) -> String {
        [
            self.address.as_str(),
            self.address2.as_str(),
            self.city.as_str(),
            self.province.as_str(),
            self.zip.as_str(),
            self.country.as_str(),
        ]
        .iter()
        .filter_map(|part| non_empty(part))
        .collect::<Vec<_>>()
        .join(", ")
    }
}
