//! Widget configuration route handler.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use codform_core::settings::ShopSettings;

use crate::error::{AppError, Result};
use crate::services::OrderStore;
use crate::state::AppState;

/// Serve a shop's settings. Shops that never saved any get the defaults.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(shop): Path<String>,
) -> Result<Json<ShopSettings>> {
    let shop = shop.trim();
    if !is_shop_domain(shop) {
        return Err(AppError::BadRequest(format!("invalid shop: {shop}")));
    }

    let settings = state.store().shop_settings(shop).await?;
    if let Err(e) = settings.form.validate()
        && !settings.form.fields.is_empty()
    {
        tracing::warn!(error = %e, "Stored form configuration is invalid");
    }
    Ok(Json(settings))
}

/// Whether `shop` looks like a shop domain (`name.myshopify.com` or a
/// custom domain).
fn is_shop_domain(shop: &str) -> bool {
    !shop.is_empty()
        && shop.len() <= 255
        && shop.contains('.')
        && shop
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
