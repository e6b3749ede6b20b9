//! Checkout route handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

/// Where to send the shopper to pay.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
}

/// Validate the caller's cart and open a hosted payment session.
#[instrument(skip(state))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<CheckoutResponse>> {
    let checkout = CheckoutService::new(state.store(), state.gateway(), state.checkout_urls());
    let session = checkout.start(user_id).await?;

    add_breadcrumb(
        "checkout",
        "Checkout session created",
        Some(&[("session_id", session.id.as_str())]),
    );

    Ok(Json(CheckoutResponse {
        checkout_url: session.url,
    }))
}
