//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Error bodies are JSON: `{"message": "..."}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::payments::WebhookError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::settlement::SettlementError;

/// Message for every 5xx response; details go to logs only.
const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the store.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Settlement failed.
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    /// Webhook could not be authenticated or parsed.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Missing or malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Settlement(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidUsername(_)
                | AuthError::InvalidEmail(_)
                | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::InvalidCredentials
                | AuthError::InvalidToken
                | AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::TokenCreation(_) | AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Catalog(err) => match err {
                CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
                CatalogError::NotFound => StatusCode::NOT_FOUND,
                CatalogError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(err) => match err {
                CartError::InvalidQuantity | CartError::EmptyCart => StatusCode::BAD_REQUEST,
                CartError::NotFound => StatusCode::NOT_FOUND,
                CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart | CheckoutError::InsufficientStock(_) => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::Gateway(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Money(_) | CheckoutError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Webhook(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        if self.status().is_server_error() {
            return if matches!(self, Self::Checkout(CheckoutError::Gateway(_))) {
                "Payment provider error".to_string()
            } else {
                INTERNAL_MESSAGE.to_string()
            };
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid login details".to_string(),
                AuthError::UserAlreadyExists => "Username registered".to_string(),
                AuthError::InvalidToken | AuthError::TokenExpired => {
                    "Invalid or expired token".to_string()
                }
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                other => other.to_string(),
            },
            Self::Catalog(CatalogError::Validation(msg)) | Self::Validation(msg) => msg.clone(),
            Self::Catalog(CatalogError::NotFound) | Self::Cart(CartError::NotFound) => {
                "Product not found".to_string()
            }
            Self::Cart(CartError::EmptyCart) | Self::Checkout(CheckoutError::EmptyCart) => {
                "Cart is empty".to_string()
            }
            Self::Cart(CartError::InvalidQuantity) => {
                "Quantity must be greater than zero".to_string()
            }
            Self::Checkout(CheckoutError::InsufficientStock(name)) => {
                format!("Insufficient stock for {name}")
            }
            Self::Webhook(WebhookError::InvalidPayload(_)) => "Invalid payload".to_string(),
            Self::Webhook(_) => "Invalid signature".to_string(),
            Self::NotFound(msg) | Self::Unauthorized(msg) | Self::Forbidden(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if let Self::Webhook(err) = &self {
            tracing::warn!(error = %err, "Webhook rejected");
        }

        let body = Json(json!({ "message": self.public_message() }));
        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self::Validation("Invalid JSON body".to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound("Product not found".to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::payments::PaymentError;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_message(err: AppError) -> String {
        let body = to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Validation("missing".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::InsufficientStock("Mug".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(WebhookError::SignatureMismatch.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("Admin access required".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(CartError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::Gateway(PaymentError::Request("timeout".to_string())).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_insufficient_stock_message_names_product() {
        let message =
            get_message(CheckoutError::InsufficientStock("Coffee Mug".to_string()).into()).await;
        assert_eq!(message, "Insufficient stock for Coffee Mug");
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let message = get_message(
            RepositoryError::DataCorruption("bad currency in row 7".to_string()).into(),
        )
        .await;
        assert_eq!(message, INTERNAL_MESSAGE);
    }
}
