//! Commerce-platform identifiers.
//!
//! Shopify hands out the same numeric id in three shapes depending on the
//! API: a JSON number (`.js` storefront endpoints, REST), a string, or a
//! GraphQL global id (`gid://shopify/ProductVariant/123`). Configuration
//! written by the merchant editor mixes all three, so ids are normalized to
//! the bare numeric string on the way in.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A normalized platform id (e.g. `"8012345678901"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PlatformId(String);

impl PlatformId {
    /// Build an id from any of the accepted shapes.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let tail = if trimmed.starts_with("gid://") {
            trimmed.rsplit('/').next().unwrap_or(trimmed)
        } else {
            trimmed
        };
        // Strip query suffixes such as `?variant=...` that sometimes leak in.
        let tail = tail.split('?').next().unwrap_or(tail);
        Self(tail.to_owned())
    }

    /// The normalized id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as a number, when it is numeric.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Whether the id is empty after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// GraphQL global id for the given resource type.
    #[must_use]
    pub fn to_gid(&self, resource: &str) -> String {
        format!("gid://shopify/{resource}/{}", self.0)
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for PlatformId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for PlatformId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl<'de> Deserialize<'de> for PlatformId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self::from(n),
            Raw::Text(s) => Self::new(&s),
        })
    }
}
