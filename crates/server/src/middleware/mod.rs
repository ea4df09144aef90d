//! HTTP middleware stack for the order server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (the widget runs on shop domains)
//! 5. Rate limiting (governor, API routes only)

pub mod client_ip;
pub mod rate_limit;
pub mod request_id;

pub use client_ip::{ClientIp, client_ip};
pub use rate_limit::{api_rate_limiter, order_rate_limiter};
pub use request_id::request_id_middleware;
