//! Stripe webhook signature verification and event parsing.
//!
//! Stripe signs each delivery with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`, where each `v1` value is
//! `hex(HMAC-SHA256(secret, "<t>.<raw body>"))`. Several `v1` entries appear
//! while a secret is being rolled; any one matching is enough.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::error::WebhookError;

/// Name of the signature header.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// The only event type that triggers settlement.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex `v1` signature for a payload.
///
/// # Errors
///
/// Returns `WebhookError::MalformedSignature` if the secret cannot key the MAC.
pub fn compute_signature(
    secret: &str,
    timestamp: i64,
    payload: &[u8],
) -> Result<String, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| WebhookError::MalformedSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// `now` is the current unix time in seconds; the signed timestamp must be
/// within `tolerance_secs` of it in either direction.
///
/// # Errors
///
/// Returns a `WebhookError` describing why the delivery is not authentic.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    tolerance_secs: u64,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse().map_err(|_| {
                    WebhookError::MalformedSignature("invalid timestamp".to_owned())
                })?);
            }
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| WebhookError::MalformedSignature("missing timestamp".to_owned()))?;
    if candidates.is_empty() {
        return Err(WebhookError::MalformedSignature(
            "missing v1 signature".to_owned(),
        ));
    }

    if now.abs_diff(timestamp) > tolerance_secs {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let expected = compute_signature(secret, timestamp, payload)?;
    if candidates
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(WebhookError::SignatureMismatch)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// A verified gateway event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event id, unique per event and stable across redeliveries.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub object: EventObject,
}

/// The object the event is about. For checkout events, the session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl WebhookEvent {
    /// Parse a verified request body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidPayload` if the body is not an event.
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Whether this event completes a checkout session.
    #[must_use]
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_SESSION_COMPLETED
    }

    /// A metadata value rendered as a string. Stripe stores metadata as
    /// strings, but numbers are accepted too.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<String> {
        match self.data.object.metadata.as_ref()?.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The checkout session id, or an empty string if absent.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.data.object.id.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_760_000_000;

    fn header_for(timestamp: i64, payload: &[u8]) -> String {
        let sig = compute_signature(SECRET, timestamp, payload).unwrap();
        format!("t={timestamp},v1={sig}")
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_verify_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = header_for(NOW, body);
        assert!(verify_signature(SECRET, &header, body, 300, NOW).is_ok());
    }

    #[test]
    fn test_verify_accepts_any_matching_v1() {
        let body = br#"{"id":"evt_1"}"#;
        let good = compute_signature(SECRET, NOW, body).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v1={good}");
        assert!(verify_signature(SECRET, &header, body, 300, NOW).is_ok());
    }

    #[test]
    fn test_verify_tampered_body() {
        let header = header_for(NOW, b"original");
        let result = verify_signature(SECRET, &header, b"tampered", 300, NOW);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn test_verify_wrong_secret() {
        let body = b"payload";
        let sig = compute_signature("other_secret", NOW, body).unwrap();
        let header = format!("t={NOW},v1={sig}");
        let result = verify_signature(SECRET, &header, body, 300, NOW);
        assert!(matches!(result, Err(WebhookError::SignatureMismatch)));
    }

    #[test]
    fn test_verify_old_timestamp() {
        let body = b"payload";
        let header = header_for(NOW - 600, body);
        let result = verify_signature(SECRET, &header, body, 300, NOW);
        assert!(matches!(result, Err(WebhookError::TimestampOutOfTolerance)));
    }

    #[test]
    fn test_verify_malformed_headers() {
        for header in ["", "v1=abc", "t=123", "t=abc,v1=def", "garbage"] {
            let result = verify_signature(SECRET, header, b"x", 300, NOW);
            assert!(
                matches!(result, Err(WebhookError::MalformedSignature(_))),
                "header {header:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_checkout_completed() {
        let body = br#"{
            "id": "evt_123",
            "type": "checkout.session.completed",
            "data": {"object": {"id": "cs_test_1", "metadata": {"user_id": "7"}}}
        }"#;
        let event = WebhookEvent::parse(body).unwrap();
        assert!(event.is_checkout_completed());
        assert_eq!(event.session_id(), "cs_test_1");
        assert_eq!(event.metadata_value("user_id").as_deref(), Some("7"));
    }

    #[test]
    fn test_parse_numeric_metadata() {
        let body = br#"{"id":"evt_1","type":"checkout.session.completed",
            "data":{"object":{"metadata":{"user_id":7}}}}"#;
        let event = WebhookEvent::parse(body).unwrap();
        assert_eq!(event.metadata_value("user_id").as_deref(), Some("7"));
        assert_eq!(event.session_id(), "");
    }

    #[test]
    fn test_parse_other_event_without_data() {
        let event = WebhookEvent::parse(br#"{"id":"evt_2","type":"charge.refunded"}"#).unwrap();
        assert!(!event.is_checkout_completed());
        assert!(event.metadata_value("user_id").is_none());
    }

    #[test]
    fn test_parse_invalid_payload() {
        assert!(matches!(
            WebhookEvent::parse(b"not json"),
            Err(WebhookError::InvalidPayload(_))
        ));
    }
}
