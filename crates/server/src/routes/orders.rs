//! Order submission route handler.

use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::instrument;

use codform_core::wire::{OrderRequestForm, OrderResponse};

use crate::middleware::ClientIp;
use crate::services::{OrderPipeline, OrderSubmission, PipelineError};
use crate::state::AppState;

pub const INVALID_REQUEST: &str = "invalid_request";
pub const INTERNAL_ERROR: &str = "internal_error";

/// Submit an order.
///
/// Every outcome is an [`OrderResponse`]. Server-side failures answer 200
/// with `success: false`; only undecodable requests get a 400.
#[instrument(skip(state, form), fields(client_ip = ?ip))]
pub async fn create(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    form: Result<Form<OrderRequestForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Undecodable order request");
            return invalid_request();
        }
    };

    let submission = OrderSubmission {
        form,
        client_ip: ip.map(|ip| ip.to_string()),
    };

    match OrderPipeline::new(state.store(), state.shopify())
        .submit(&submission, Utc::now())
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(PipelineError::InvalidRequest(e)) => {
            tracing::warn!(error = %e, "Invalid order request");
            invalid_request()
        }
        Err(PipelineError::MissingShop) => invalid_request(),
        Err(PipelineError::Repository(e)) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                error = %e,
                sentry_event_id = %event_id,
                "Order could not be stored"
            );
            Json(OrderResponse::failure(INTERNAL_ERROR)).into_response()
        }
    }
}

fn invalid_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(OrderResponse::failure(INVALID_REQUEST)),
    )
        .into_response()
}
