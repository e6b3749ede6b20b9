//! Payment gateway webhook handler.
//!
//! The raw body is authenticated before it is parsed or any store is
//! touched. A 2xx answer tells the gateway to stop retrying, so only settled,
//! duplicate and ignored events are acknowledged.

use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode};
use chrono::Utc;
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::db::SettlementStore;
use crate::error::Result;
use crate::payments::webhook::SIGNATURE_HEADER;
use crate::payments::{WebhookError, WebhookEvent, verify_signature};
use crate::services::settlement::{SettlementOutcome, SettlementService};
use crate::state::AppState;

/// Receive a Stripe webhook delivery.
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let stripe = &state.config().stripe;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    verify_signature(
        stripe.webhook_secret.expose_secret(),
        signature,
        &body,
        stripe.webhook_tolerance_secs,
        Utc::now().timestamp(),
    )?;

    let event = WebhookEvent::parse(&body)?;

    let store: &dyn SettlementStore = state.store();
    let outcome = SettlementService::new(store, state.config().low_stock_threshold)
        .settle(&event)
        .await
        .inspect_err(|e| {
            tracing::error!(event_id = %event.id, error = %e, "Settlement failed");
        })?;

    if let SettlementOutcome::Settled(payment) = &outcome {
        tracing::info!(event_id = %event.id, payment_id = %payment.id, "Webhook settled");
    }

    Ok(StatusCode::OK)
}
