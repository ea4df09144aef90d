//! Business logic services for the order server.
//!
//! # Services
//!
//! - `orders` - Order synthesis pipeline (`POST /api/orders`)
//! - `upsell` - Post-purchase upsell application
//! - `blocking` - Block lists and rate limiting
//!
//! Services run against two seams, [`OrderStore`] and [`CommercePlatform`],
//! so they can be exercised without Postgres or Shopify.

pub mod blocking;
pub mod orders;
pub mod platform;
pub mod store;
pub mod upsell;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing;

pub use orders::{OrderPipeline, OrderSubmission, PipelineError};
pub use platform::CommercePlatform;
pub use store::{OrderStore, PgStore};
pub use upsell::{UpsellError, UpsellService};
