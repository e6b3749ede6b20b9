//! Authentication extractors.
//!
//! Clients send `Authorization: Bearer <jwt>`. Access tokens authenticate
//! ordinary calls; refresh tokens are only accepted by `/refresh`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};

use bazaar_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::TokenKind;
use crate::state::AppState;

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user_id): RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {user_id}!")
/// }
/// ```
pub struct RequireAuth(pub UserId);

/// Extractor that requires a valid refresh token.
pub struct RequireRefresh(pub UserId);

/// Extractor that requires an access token belonging to an admin.
pub struct RequireAdmin(pub User);

/// Why an authenticated extractor rejected the request.
#[derive(Debug)]
pub enum AuthRejection {
    /// No bearer token was sent.
    MissingToken,
    /// The token did not verify.
    InvalidToken,
    /// The caller is authenticated but not an admin.
    NotAdmin,
    /// The user lookup failed.
    Internal(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::MissingToken => {
                AppError::Unauthorized("Missing Authorization Header".to_string()).into_response()
            }
            Self::InvalidToken => {
                AppError::Unauthorized("Invalid or expired token".to_string()).into_response()
            }
            Self::NotAdmin => {
                AppError::Forbidden("Admin access required".to_string()).into_response()
            }
            Self::Internal(err) => err.into_response(),
        }
    }
}

/// The token from an `Authorization: Bearer` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn authenticate(
    parts: &Parts,
    state: &AppState,
    kind: TokenKind,
) -> Result<UserId, AuthRejection> {
    let token = bearer_token(parts).ok_or(AuthRejection::MissingToken)?;
    let user_id = state
        .tokens()
        .verify(token, kind)
        .map_err(|_| AuthRejection::InvalidToken)?;

    set_sentry_user(&user_id);
    Ok(user_id)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, TokenKind::Access).map(Self)
    }
}

impl FromRequestParts<AppState> for RequireRefresh {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state, TokenKind::Refresh).map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = authenticate(parts, state, TokenKind::Access)?;

        let user = state
            .store()
            .get_user(user_id)
            .await
            .map_err(|e| AuthRejection::Internal(e.into()))?;

        match user {
            Some(user) if user.is_admin => Ok(Self(user)),
            _ => {
                tracing::info!(user_id = %user_id, "Admin access denied");
                Err(AuthRejection::NotAdmin)
            }
        }
    }
}
