//! Core types for codform.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod platform_id;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{format_amount, from_minor_units, round_money};
pub use platform_id::PlatformId;
pub use status::*;
