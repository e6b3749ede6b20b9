//! Payment gateway error types.

use thiserror::Error;

/// Errors from the payment provider's API.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed or timed out.
    #[error("payment request failed: {0}")]
    Request(String),

    /// Failed to parse the provider's response.
    #[error("payment response error: {0}")]
    Response(String),

    /// The provider rejected the request.
    #[error("payment provider error ({status}): {message}")]
    Api {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider error message.
        message: String,
    },
}

/// Errors verifying or parsing an incoming webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature header is absent.
    #[error("missing signature header")]
    MissingSignature,

    /// The signature header has no usable timestamp or `v1` entries.
    #[error("malformed signature header: {0}")]
    MalformedSignature(String),

    /// The signed timestamp is outside the accepted window.
    #[error("signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    /// No `v1` entry matches the expected signature.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The verified body is not a valid event.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}
