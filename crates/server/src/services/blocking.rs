//! Order blocking checks.
//!
//! List rules are pure and live in `codform_core::blocking`; this module adds
//! the rate-limit count, which needs the order store.

use chrono::{DateTime, Duration, Utc};
use tracing::instrument;

use codform_core::blocking::{BlockReason, BuyerIdentity};
use codform_core::customer::CustomerFields;

use super::store::OrderStore;
use crate::db::RepositoryError;

/// Result of the blocking checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDecision {
    Allowed,
    Blocked {
        reason: BlockReason,
        message: String,
    },
}

impl BlockDecision {
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Run the shop's blocking policy against a normalized customer.
///
/// A shop with no saved policy blocks nothing.
///
/// # Errors
///
/// Returns `RepositoryError` if the policy or the recent-order count cannot be read.
#[instrument(skip(store, customer), fields(shop = %shop))]
pub async fn check<S: OrderStore>(
    store: &S,
    shop: &str,
    customer: &CustomerFields,
    client_ip: Option<&str>,
    now: DateTime<Utc>,
) -> Result<BlockDecision, RepositoryError> {
    let Some(settings) = store.blocking_settings(shop).await? else {
        return Ok(BlockDecision::Allowed);
    };

    let identity = BuyerIdentity {
        email: &customer.email,
        phone: &customer.phone,
        ip: client_ip,
        postal_code: &customer.zip,
    };

    let reason = match settings.evaluate_lists(&identity) {
        Some(reason) => Some(reason),
        None if settings.rate_limit.is_enabled() => {
            let since = now - Duration::hours(i64::from(settings.rate_limit.window_hours));
            let email = customer.valid_email().map(|e| e.normalized());
            let existing = store
                .count_recent_orders(shop, client_ip, email.as_deref(), since)
                .await?;
            settings
                .rate_limit_exceeded(existing)
                .then_some(BlockReason::RateLimit)
        }
        None => None,
    };

    Ok(match reason {
        Some(reason) => {
            tracing::info!(rule = %reason, "Order blocked");
            BlockDecision::Blocked {
                reason,
                message: settings.message().to_string(),
            }
        }
        None => BlockDecision::Allowed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::testing::MemoryStore;
    use codform_core::blocking::{BlockingSettings, RateLimit};

    fn customer(email: &str) -> CustomerFields {
        CustomerFields {
            first_name: "Ada".to_string(),
            email: email.to_string(),
            phone: "+1 (555) 010-0000".to_string(),
            zip: "90210".to_string(),
            ..CustomerFields::default()
        }
    }

    #[tokio::test]
    async fn test_no_settings_allows() {
        let store = MemoryStore::default();
        let decision = check(&store, "shop", &customer("a@b.co"), Some("1.2.3.4"), Utc::now())
            .await
            .unwrap();
        assert_eq!(decision, BlockDecision::Allowed);
    }

    #[tokio::test]
    async fn test_blocked_email_uses_merchant_message() {
        let store = MemoryStore::default().with_blocking(BlockingSettings {
            blocked_emails: vec!["@spam.test".to_string()],
            block_message: "Call us instead".to_string(),
            ..BlockingSettings::default()
        });
        let decision = check(&store, "shop", &customer("x@spam.test"), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            decision,
            BlockDecision::Blocked {
                reason: BlockReason::Email,
                message: "Call us instead".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_at_max() {
        let store = MemoryStore::default().with_blocking(BlockingSettings {
            rate_limit: RateLimit {
                window_hours: 24,
                max_orders: 2,
            },
            ..BlockingSettings::default()
        });
        let now = Utc::now();

        store.seed_order("shop", Some("1.2.3.4"), "first@b.co", now - Duration::hours(1));
        let decision = check(&store, "shop", &customer("a@b.co"), Some("1.2.3.4"), now)
            .await
            .unwrap();
        assert!(!decision.is_blocked());

        store.seed_order("shop", None, "a@b.co", now - Duration::hours(2));
        let decision = check(&store, "shop", &customer("A@B.co"), Some("9.9.9.9"), now)
            .await
            .unwrap();
        assert!(!decision.is_blocked(), "one match by email only");

        let decision = check(&store, "shop", &customer("a@b.co"), Some("1.2.3.4"), now)
            .await
            .unwrap();
        assert!(matches!(
            decision,
            BlockDecision::Blocked {
                reason: BlockReason::RateLimit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_ignores_orders_outside_window() {
        let store = MemoryStore::default().with_blocking(BlockingSettings {
            rate_limit: RateLimit {
                window_hours: 1,
                max_orders: 1,
            },
            ..BlockingSettings::default()
        });
        let now = Utc::now();
        store.seed_order("shop", Some("1.2.3.4"), "a@b.co", now - Duration::hours(3));
        store.seed_order("other", Some("1.2.3.4"), "a@b.co", now);

        let decision = check(&store, "shop", &customer("a@b.co"), Some("1.2.3.4"), now)
            .await
            .unwrap();
        assert!(!decision.is_blocked());
    }

    #[tokio::test]
    async fn test_list_rule_wins_over_rate_limit() {
        let store = MemoryStore::default().with_blocking(BlockingSettings {
            blocked_ips: vec!["1.2.3.4".to_string()],
            rate_limit: RateLimit {
                window_hours: 1,
                max_orders: 1,
            },
            ..BlockingSettings::default()
        });
        let now = Utc::now();
        store.seed_order("shop", Some("1.2.3.4"), "a@b.co", now);

        let decision = check(&store, "shop", &customer("a@b.co"), Some("1.2.3.4"), now)
            .await
            .unwrap();
        assert!(matches!(
            decision,
            BlockDecision::Blocked {
                reason: BlockReason::Ip,
                ..
            }
        ));
    }
}
