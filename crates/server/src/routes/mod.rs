//! HTTP route handlers for the order server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Widget API (CORS, rate limited)
//! GET  /api/config/{shop}      - Shop settings for the widget
//! POST /api/orders             - Submit an order (form-encoded)
//! POST /api/orders/upsell      - Add an accepted upsell (JSON)
//! ```

pub mod config;
pub mod orders;
pub mod upsell;

use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{api_rate_limiter, order_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// The full application router, without the Sentry layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            },
        ))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// CORS for the widget, which is served from every shop's own domain.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create))
        .layer(order_rate_limiter())
        .merge(
            Router::new()
                .route("/upsell", post(upsell::add))
                .layer(api_rate_limiter()),
        )
}

/// Create the configuration routes router.
pub fn config_routes() -> Router<AppState> {
    Router::new()
        .route("/{shop}", get(config::show))
        .layer(api_rate_limiter())
}

/// Create the widget API router, mounted at `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/orders", order_routes())
        .nest("/config", config_routes())
        .layer(cors_layer())
}
