//! Payment ledger queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{PaymentId, UserId};

use super::{PgStore, parse_currency};
use crate::db::{PaymentStore, RepositoryError};
use crate::models::PaymentRecord;

pub(super) const PAYMENT_COLUMNS: &str =
    "id, user_id, total, currency, gateway_event_id, gateway_session_id, created_at";

#[derive(sqlx::FromRow)]
pub(super) struct PaymentRow {
    id: i32,
    user_id: i32,
    total: Decimal,
    currency: String,
    gateway_event_id: String,
    gateway_session_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: PaymentId::new(row.id),
            user_id: UserId::new(row.user_id),
            total: row.total,
            currency: parse_currency(&row.currency)?,
            gateway_event_id: row.gateway_event_id,
            gateway_session_id: row.gateway_session_id,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn payments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PaymentRecord>, RepositoryError> {
        let rows: Vec<PaymentRow> = sqlx::query_as(&format!(
            r"
            SELECT {PAYMENT_COLUMNS} FROM bazaar.payments
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PaymentRecord::try_from).collect()
    }
}
