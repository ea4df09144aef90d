//! Real client IP behind Cloudflare and Fly.io.
//!
//! The same header order is used for rate limiting and for the IP recorded on
//! local orders, so blocking rules and the limiter agree on who the shopper is.

use std::convert::Infallible;
use std::net::IpAddr;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

/// Proxy headers checked for the client IP, most trusted first.
const IP_HEADERS: &[&str] = &["cf-connecting-ip", "x-forwarded-for", "x-real-ip", "fly-client-ip"];

/// First parseable client IP from the proxy headers.
///
/// `X-Forwarded-For` contributes only its first entry.
#[must_use]
pub fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    IP_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

/// Extractor for the client IP. Never rejects; `None` when no header parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_ip(&parts.headers)))
    }
}
