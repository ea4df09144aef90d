//! Status enums for local orders and platform outcomes.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a locally persisted order.
///
/// Every submission starts as `Pending` and is written before the platform
/// call. It only moves on once the platform answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocalOrderStatus {
    /// Persisted, platform order not (yet) created.
    #[default]
    Pending,
    /// Platform order or draft order created.
    Created,
    /// Platform rejected the order even after the no-customer retry.
    Failed,
}

impl LocalOrderStatus {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Created => "created",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LocalOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LocalOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "created" => Ok(Self::Created),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid local order status: {s}")),
        }
    }
}

/// Which kind of platform record was created for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// A real order.
    Order,
    /// An unconfirmed draft order.
    DraftOrder,
}

impl OrderType {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::DraftOrder => "draft_order",
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(Self::Order),
            "draft_order" => Ok(Self::DraftOrder),
            _ => Err(format!("invalid order type: {s}")),
        }
    }
}
