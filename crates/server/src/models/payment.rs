//! Payment ledger types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{CurrencyCode, PaymentId, UserId};

/// An immutable ledger entry for one completed checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub user_id: UserId,
    pub total: Decimal,
    pub currency: CurrencyCode,
    /// Gateway event that produced this entry.
    pub gateway_event_id: String,
    /// Gateway checkout session that was paid.
    pub gateway_session_id: String,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a ledger entry.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: UserId,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub gateway_event_id: String,
    pub gateway_session_id: String,
}
