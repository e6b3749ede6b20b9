//! HTTP route handlers for the store API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                  - Liveness check
//! GET    /health/ready            - Readiness check (store ping)
//!
//! # Auth (rate limited)
//! POST   /register                - Create account, returns token pair
//! POST   /login                   - Returns access token
//! POST   /refresh                 - Refresh token -> new access token
//! GET    /logout                  - Stateless logout (POST also accepted)
//!
//! # Catalog
//! GET    /products?search=        - Public product listing
//!
//! # Cart (requires auth)
//! POST   /cart                    - Add a cart line
//! DELETE /cart/{id}               - Remove one of the caller's lines
//! GET    /carts/final             - Priced cart summary
//!
//! # Checkout & payments
//! POST   /checkout                - Open hosted payment session
//! POST   /stripe/webhook          - Payment settlement (signature auth)
//! GET    /payments                - Caller's payment ledger
//!
//! # Admin (requires admin)
//! GET    /admin/products          - Inventory listing
//! POST   /admin/products          - Create product
//! PUT    /admin/products/{id}     - Partial update
//! DELETE /admin/products/{id}     - Delete product
//! GET    /admin/low-stock         - Products at or below threshold
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod payments;
pub mod products;
pub mod webhooks;

use std::time::Duration;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts, State},
    http::StatusCode,
    middleware::from_fn,
    routing::{delete, get, post, put},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, request_id_middleware};
use crate::state::AppState;

/// JSON request body whose rejections render as `AppError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Path parameters whose rejections render as `AppError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

/// Query parameters whose rejections render as `AppError`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Create the credential routes router.
pub fn auth_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh));

    if !rate_limit {
        return router;
    }
    match auth_rate_limiter() {
        Some(limiter) => router.route_layer(limiter),
        None => {
            tracing::error!("Invalid rate limiter quota; credential routes are not limited");
            router
        }
    }
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", post(cart::add))
        .route("/cart/{id}", delete(cart::remove))
        .route("/carts/final", get(cart::summary))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(admin::list).post(admin::create))
        .route("/products/{id}", put(admin::update).delete(admin::remove))
        .route("/low-stock", get(admin::low_stock))
}

/// Create all API routes.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(auth_routes(rate_limit))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/products", get(products::index))
        .merge(cart_routes())
        .route("/checkout", post(checkout::create))
        .route("/stripe/webhook", post(webhooks::stripe))
        .route("/payments", get(payments::index))
        .nest("/admin", admin_routes())
}

/// Build the application with request tracing applied.
///
/// Sentry layers are added by the binary so tests run without a hub.
pub fn app(state: AppState) -> Router {
    let rate_limit = state.config().rate_limit;

    routes(rate_limit)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
