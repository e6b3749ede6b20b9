//! Payment ledger route handler.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use bazaar_core::{CurrencyCode, PaymentId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::PaymentRecord;
use crate::state::AppState;

/// A settled payment as shown to its owner.
#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub id: PaymentId,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRecord> for PaymentView {
    fn from(record: PaymentRecord) -> Self {
        Self {
            id: record.id,
            total: record.total,
            currency: record.currency,
            session_id: record.gateway_session_id,
            created_at: record.created_at,
        }
    }
}

/// The caller's payments, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<Vec<PaymentView>>> {
    let payments = state.store().payments_for_user(user_id).await?;
    Ok(Json(payments.into_iter().map(PaymentView::from).collect()))
}
