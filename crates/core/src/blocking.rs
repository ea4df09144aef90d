//! Order blocking policy.
//!
//! Merchants keep block lists (emails, phones, IPs, postal codes), an optional
//! IP allow-list and an order-count rate limit. Checks run in a fixed order
//! and stop at the first match, so the rule reported to the merchant is
//! always the cheapest one that fired.
//!
//! List matching lives here. The rate-limit count needs the order store, so
//! the server counts and then asks [`BlockingSettings::rate_limit_exceeded`].

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// How the postal-code list is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostalCodeMode {
    /// Listed codes are blocked.
    #[default]
    Exclude,
    /// Only listed codes may order.
    Include,
}

/// Sliding-window order limit per IP or email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimit {
    /// Window length in hours. Zero disables the limit.
    pub window_hours: u32,
    /// Orders allowed inside the window. Zero disables the limit.
    pub max_orders: u32,
}

impl RateLimit {
    /// Whether the limit is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.window_hours > 0 && self.max_orders > 0
    }
}

/// A shop's blocking rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockingSettings {
    pub blocked_emails: Vec<String>,
    pub blocked_phones: Vec<String>,
    pub blocked_ips: Vec<String>,
    /// When non-empty, only these IPs may order.
    pub allowed_ips: Vec<String>,
    pub postal_codes: Vec<String>,
    pub postal_code_mode: PostalCodeMode,
    pub rate_limit: RateLimit,
    /// Message shown to a blocked shopper.
    pub block_message: String,
}

impl Default for BlockingSettings {
    fn default() -> Self {
        Self {
            blocked_emails: Vec::new(),
            blocked_phones: Vec::new(),
            blocked_ips: Vec::new(),
            allowed_ips: Vec::new(),
            postal_codes: Vec::new(),
            postal_code_mode: PostalCodeMode::default(),
            rate_limit: RateLimit::default(),
            block_message: DEFAULT_BLOCK_MESSAGE.to_string(),
        }
    }
}

/// Shown when the merchant left the block message empty.
pub const DEFAULT_BLOCK_MESSAGE: &str = "We are unable to process your order at this time.";

/// The rule that blocked a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Email,
    Phone,
    Ip,
    IpNotAllowed,
    PostalCode,
    RateLimit,
}

impl BlockReason {
    /// Short rule name for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ip => "ip",
            Self::IpNotAllowed => "ip_not_allowed",
            Self::PostalCode => "postal_code",
            Self::RateLimit => "rate_limit",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The submitted values the policy looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyerIdentity<'a> {
    pub email: &'a str,
    pub phone: &'a str,
    pub ip: Option<&'a str>,
    pub postal_code: &'a str,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn phone_digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

fn normalize_postal_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

fn email_matches(entry: &str, email: &str) -> bool {
    let entry = normalize_email(entry);
    if entry.is_empty() {
        return false;
    }
    if entry.starts_with('@') {
        email.ends_with(&entry)
    } else {
        entry == email
    }
}

fn ip_matches(entry: &str, ip: &str) -> bool {
    let entry = entry.trim();
    match (entry.parse::<IpAddr>(), ip.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => !entry.is_empty() && entry == ip,
    }
}

impl BlockingSettings {
    /// The message to show a blocked shopper.
    #[must_use]
    pub fn message(&self) -> &str {
        let message = self.block_message.trim();
        if message.is_empty() {
            DEFAULT_BLOCK_MESSAGE
        } else {
            message
        }
    }

    /// Run the list checks in order: email, phone, IP, IP allow-list, postal
    /// code. Returns the first rule that matched.
    #[must_use]
    pub fn evaluate_lists(&self, identity: &BuyerIdentity<'_>) -> Option<BlockReason> {
        let email = normalize_email(identity.email);
        if !email.is_empty()
            && self
                .blocked_emails
                .iter()
                .any(|entry| email_matches(entry, &email))
        {
            return Some(BlockReason::Email);
        }

        let phone = phone_digits(identity.phone);
        if !phone.is_empty()
            && self
                .blocked_phones
                .iter()
                .any(|entry| phone_digits(entry) == phone)
        {
            return Some(BlockReason::Phone);
        }

        let ip = identity.ip.map(str::trim).filter(|ip| !ip.is_empty());
        if let Some(ip) = ip
            && self.blocked_ips.iter().any(|entry| ip_matches(entry, ip))
        {
            return Some(BlockReason::Ip);
        }

        let allow_list: Vec<&String> = self
            .allowed_ips
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .collect();
        if !allow_list.is_empty()
            && !ip.is_some_and(|ip| allow_list.iter().any(|entry| ip_matches(entry, ip)))
        {
            return Some(BlockReason::IpNotAllowed);
        }

        if self.postal_code_blocked(identity.postal_code) {
            return Some(BlockReason::PostalCode);
        }

        None
    }

    fn postal_code_blocked(&self, postal_code: &str) -> bool {
        let listed: Vec<String> = self
            .postal_codes
            .iter()
            .map(|code| normalize_postal_code(code))
            .filter(|code| !code.is_empty())
            .collect();
        if listed.is_empty() {
            return false;
        }
        let code = normalize_postal_code(postal_code);
        let present = listed.contains(&code);
        match self.postal_code_mode {
            PostalCodeMode::Exclude => present,
            PostalCodeMode::Include => !present,
        }
    }

    /// Whether one more order would exceed the rate limit, given the number
    /// of orders already placed inside the window.
    #[must_use]
    pub fn rate_limit_exceeded(&self, existing_orders: i64) -> bool {
        self.rate_limit.is_enabled() && existing_orders >= i64::from(self.rate_limit.max_orders)
    }
}
