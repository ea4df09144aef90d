//! Upsell route handler.

use axum::{Json, extract::State};
use chrono::Utc;
use tracing::instrument;

use codform_core::wire::{UpsellRequest, UpsellResponse};

use crate::error::Result;
use crate::services::UpsellService;
use crate::state::AppState;

/// Add an accepted upsell to an existing order.
#[instrument(skip(state, request), fields(shop = %request.shop))]
pub async fn add(
    State(state): State<AppState>,
    Json(request): Json<UpsellRequest>,
) -> Result<Json<UpsellResponse>> {
    let response = UpsellService::new(state.store(), state.shopify())
        .apply(&request, Utc::now())
        .await?;
    Ok(Json(response))
}
