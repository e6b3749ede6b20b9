//! Integration tests for Bazaar.
//!
//! Tests drive the full axum router in-process with `tower::ServiceExt`
//! against the in-memory store and a recording fake payment gateway, so no
//! database or network is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `auth` - Registration, login, token refresh
//! - `cart` - Catalog listing and cart operations
//! - `checkout` - Hosted session creation
//! - `settlement` - Signed webhook settlement
//! - `admin` - Inventory management

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use bazaar_core::{CurrencyCode, ProductId, UserId, Username};
use bazaar_server::config::{AuthConfig, LogFormat, ShopConfig, StorageConfig, StripeConfig};
use bazaar_server::db::{MemoryStore, ProductStore, UserStore};
use bazaar_server::models::{NewProduct, Product};
use bazaar_server::payments::webhook::SIGNATURE_HEADER;
use bazaar_server::payments::{
    HostedSession, PaymentError, PaymentGateway, SessionRequest, compute_signature,
};
use bazaar_server::routes;
use bazaar_server::state::AppState;

/// Webhook signing secret shared by the test app and [`TestApp::post_webhook`].
pub const WEBHOOK_SECRET: &str = "whsec_Tq7Lm2Xv9Rk4Wp8Zs1Hd";

/// Password used for every registered test user.
pub const PASSWORD: &str = "correct-horse-battery";

/// Payment gateway fake that records every session request.
#[derive(Default)]
pub struct RecordingGateway {
    requests: Mutex<Vec<SessionRequest>>,
    fail: AtomicBool,
}

impl RecordingGateway {
    /// Requests received so far.
    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Make subsequent calls fail like an unreachable provider.
    pub fn fail_next_calls(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<HostedSession, PaymentError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());

        if self.fail.load(Ordering::SeqCst) {
            return Err(PaymentError::Request("connection refused".to_owned()));
        }

        let id = format!("cs_test_{}", requests.len());
        Ok(HostedSession {
            url: format!("https://checkout.example/pay/{id}"),
            id,
        })
    }
}

fn test_config() -> ShopConfig {
    ShopConfig {
        storage: StorageConfig::Memory,
        host: "127.0.0.1".parse().unwrap(),
        port: 5000,
        base_url: "http://127.0.0.1:5000".to_owned(),
        checkout_success_url: "http://127.0.0.1:5000/success".to_owned(),
        checkout_cancel_url: "http://127.0.0.1:5000/cancel".to_owned(),
        auth: AuthConfig {
            jwt_secret: SecretString::from("Jq4Zr8Lm2Xv6Tn1Wp9Hs3Kd7Bf5Gc0Ya"),
            access_token_ttl: chrono::Duration::days(30),
            refresh_token_ttl: chrono::Duration::days(30),
        },
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_Vx8Qm3Lz6Rt1Wk4P"),
            webhook_secret: SecretString::from(WEBHOOK_SECRET),
            api_base: "http://127.0.0.1:9".to_owned(),
            timeout: Duration::from_secs(1),
            webhook_tolerance_secs: 300,
        },
        low_stock_threshold: 2,
        rate_limit: false,
        log_format: LogFormat::Text,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// A JSON response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// Parsed body, or `Value::Null` for an empty body.
    pub body: Value,
}

impl TestResponse {
    /// The `message` field of the body.
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

/// The application under test plus handles to its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub gateway: Arc<RecordingGateway>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Build a fresh application with empty state.
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let gateway = Arc::new(RecordingGateway::default());
        let state = AppState::new(test_config(), Arc::new(store.clone()), gateway.clone());

        Self {
            router: routes::app(state),
            store,
            gateway,
        }
    }

    /// Send a request with an optional bearer token and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        // Plain-text bodies (health checks) are kept as a JSON string.
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }

    /// `GET` with an optional token.
    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    /// `POST` a JSON body with an optional token.
    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Register a user and return their access token.
    pub async fn register(&self, username: &str) -> String {
        let response = self
            .post(
                "/register",
                None,
                serde_json::json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["token"].as_str().unwrap().to_owned()
    }

    /// Register a user, grant them the admin role and return their token.
    pub async fn register_admin(&self, username: &str) -> String {
        let token = self.register(username).await;
        let granted = self
            .store
            .set_admin(&Username::parse(username).unwrap(), true)
            .await
            .unwrap();
        assert!(granted);
        token
    }

    /// Id of a registered user.
    pub async fn user_id(&self, username: &str) -> UserId {
        let (user, _) = self
            .store
            .get_user_credentials(&Username::parse(username).unwrap())
            .await
            .unwrap()
            .unwrap();
        user.id
    }

    /// Insert a DKK product directly into the store.
    pub async fn add_product(&self, name: &str, amount: i32, price: &str) -> ProductId {
        self.store
            .create_product(&NewProduct {
                name: name.to_owned(),
                amount,
                price: price.parse::<Decimal>().unwrap(),
                currency: CurrencyCode::DKK,
            })
            .await
            .unwrap()
            .id
    }

    /// Current state of a product.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.store.get_product(id).await.unwrap()
    }

    /// Add a cart line through the API.
    pub async fn add_to_cart(&self, token: &str, product_id: ProductId, quantity: i32) {
        let response = self
            .post(
                "/cart",
                Some(token),
                serde_json::json!({ "product_id": product_id, "quantity": quantity }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    }

    /// Deliver a webhook payload with a valid signature.
    pub async fn post_webhook(&self, payload: &str) -> TestResponse {
        let timestamp = Utc::now().timestamp();
        let signature = compute_signature(WEBHOOK_SECRET, timestamp, payload.as_bytes()).unwrap();
        self.post_webhook_with_header(payload, &format!("t={timestamp},v1={signature}"))
            .await
    }

    /// Deliver a webhook payload with an arbitrary signature header.
    pub async fn post_webhook_with_header(&self, payload: &str, signature: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/stripe/webhook")
            .header(SIGNATURE_HEADER, signature)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_owned()))
            .unwrap();
        self.send(request).await
    }
}

/// A `checkout.session.completed` event for a user.
pub fn completed_event(event_id: &str, user_id: UserId) -> String {
    serde_json::json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": format!("cs_{event_id}"),
                "metadata": { "user_id": user_id.to_string() }
            }
        }
    })
    .to_string()
}
