//! Stripe Checkout client.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, error, instrument};

use super::error::PaymentError;
use super::{HostedSession, PaymentGateway, SessionRequest};
use crate::config::StripeConfig;

/// Stripe API client for hosted checkout sessions.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: SecretString,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    /// Create a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` if the HTTP client cannot be built.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            secret_key: config.secret_key.clone(),
        })
    }
}

/// Form fields for `POST /v1/checkout/sessions`.
fn session_form(request: &SessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_owned(), "payment".to_owned()),
        ("payment_method_types[0]".to_owned(), "card".to_owned()),
        ("success_url".to_owned(), request.success_url.clone()),
        ("cancel_url".to_owned(), request.cancel_url.clone()),
        ("metadata[user_id]".to_owned(), request.user_id.to_string()),
    ];

    for (i, line) in request.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        params.push((
            format!("{prefix}[price_data][currency]"),
            line.currency.clone(),
        ));
        params.push((
            format!("{prefix}[price_data][product_data][name]"),
            line.name.clone(),
        ));
        params.push((
            format!("{prefix}[price_data][unit_amount]"),
            line.unit_amount.to_string(),
        ));
        params.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }

    params
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, request), fields(user_id = %request.user_id, lines = request.lines.len()))]
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<HostedSession, PaymentError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&session_form(request))
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| "Unknown error".to_owned());
            error!(status = status.as_u16(), %message, "Stripe rejected checkout session");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Response(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Response("checkout session has no url".to_owned()))?;

        debug!(session_id = %session.id, "Checkout session created");

        Ok(HostedSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use bazaar_core::UserId;

    use super::*;
    use crate::payments::SessionLine;

    fn request() -> SessionRequest {
        SessionRequest {
            user_id: UserId::new(7),
            lines: vec![
                SessionLine {
                    name: "Mug".to_owned(),
                    unit_amount: 1000,
                    currency: "dkk".to_owned(),
                    quantity: 2,
                },
                SessionLine {
                    name: "Plate".to_owned(),
                    unit_amount: 499,
                    currency: "dkk".to_owned(),
                    quantity: 1,
                },
            ],
            success_url: "http://localhost/success".to_owned(),
            cancel_url: "http://localhost/cancel".to_owned(),
        }
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_session_form_fields() {
        let form = session_form(&request());
        assert_eq!(field(&form, "mode"), Some("payment"));
        assert_eq!(field(&form, "metadata[user_id]"), Some("7"));
        assert_eq!(field(&form, "success_url"), Some("http://localhost/success"));
        assert_eq!(
            field(&form, "line_items[0][price_data][unit_amount]"),
            Some("1000")
        );
        assert_eq!(
            field(&form, "line_items[1][price_data][product_data][name]"),
            Some("Plate")
        );
        assert_eq!(field(&form, "line_items[1][quantity]"), Some("1"));
        assert_eq!(
            field(&form, "line_items[0][price_data][currency]"),
            Some("dkk")
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = StripeConfig {
            secret_key: SecretString::from("sk_test_abcdef".to_owned()),
            webhook_secret: SecretString::from("whsec_abcdef".to_owned()),
            api_base: "https://api.stripe.com/".to_owned(),
            timeout: std::time::Duration::from_secs(10),
            webhook_tolerance_secs: 300,
        };
        let client = StripeClient::new(&config).unwrap_or_else(|e| panic!("{e}"));
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk_test_abcdef"));
        assert!(debug.contains("https://api.stripe.com\""));
    }
}
