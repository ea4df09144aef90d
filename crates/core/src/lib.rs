//! Codform Core - shared checkout logic.
//!
//! This crate provides the pieces used by both sides of the cash-on-delivery
//! checkout:
//! - `widget` - Headless product-page checkout widget
//! - `server` - Order synthesis HTTP service
//! - `cli` - Command-line tools for migrations and offline quotes
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The server is the source of truth for prices; the
//! widget runs the very same calculator for optimistic display.
//!
//! # Modules
//!
//! - [`pricing`] - Offer pricing calculator and the active-offer union
//! - [`offers`] - Quantity offers, upsells, downsells, discount codes
//! - [`form`] - Merchant form configuration
//! - [`shipping`] - Shipping rates
//! - [`blocking`] - Block/allow lists and rate-limit policy
//! - [`customer`] - Customer field normalization
//! - [`note`] - Merchant audit note generation
//! - [`settings`] - Per-shop order settings and configuration payload
//! - [`wire`] - Request/response bodies shared by widget and server
//! - [`types`] - Newtype IDs, emails, statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod blocking;
pub mod customer;
pub mod form;
pub mod note;
pub mod offers;
pub mod pricing;
pub mod settings;
pub mod shipping;
pub mod types;
pub mod wire;

pub use types::*;
