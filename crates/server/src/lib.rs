//! Codform order server library.
//!
//! Receives cash-on-delivery order submissions from the widget, stores them
//! locally, re-prices them and creates the matching Shopify order.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
