//! Codform Widget - headless cash-on-delivery checkout for product pages.
//!
//! The widget detects the product on the page, renders the merchant's form
//! through a [`render::Renderer`], keeps the platform cart in step with the
//! form and submits orders to the checkout service.
//!
//! # Example
//!
//! ```rust,ignore
//! let options = WidgetOptions::new(shop, app_url, storefront_url)?;
//! let engine = CheckoutEngine::mount(
//!     options.clone(),
//!     HttpStorefront::new(&options),
//!     HttpCheckoutApi::new(&options),
//!     MemoryRenderer::new(),
//!     page_url,
//! )
//! .await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod engine;
pub mod error;
pub mod product;
pub mod render;
pub mod state;
pub mod submit;
pub mod view;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;

pub use api::{CheckoutApi, HttpCheckoutApi, HttpStorefront, StorefrontApi};
pub use config::WidgetOptions;
pub use engine::CheckoutEngine;
pub use error::WidgetError;
pub use render::{MemoryRenderer, Renderer};
pub use state::CheckoutPhase;
