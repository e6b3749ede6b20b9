//! Authentication route handlers.
//!
//! Tokens are stateless JWTs; logout only clears request-scoped context.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, RequireRefresh};
use crate::routes::JsonBody;
use crate::services::auth::{AuthService, TokenKind};
use crate::state::AppState;

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Tokens issued at registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub refresh_token: String,
}

/// Token issued at login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Access token issued from a refresh token.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

fn required(value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation("Missing required fields".to_string()))
}

/// Handle registration.
#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<RegisterForm>,
) -> Result<Json<RegisterResponse>> {
    let (username, email, password) = (
        required(form.username)?,
        required(form.email)?,
        required(form.password)?,
    );

    let auth = AuthService::new(state.store(), state.tokens());
    let (user, tokens) = auth.register(&username, &email, &password).await?;

    set_sentry_user(&user.id);
    add_breadcrumb("auth", "User registered", None);

    Ok(Json(RegisterResponse {
        token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// Handle login.
#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<LoginForm>,
) -> Result<Json<LoginResponse>> {
    // Incomplete credentials are treated like wrong ones.
    let username = form.username.unwrap_or_default();
    let password = form.password.unwrap_or_default();

    let auth = AuthService::new(state.store(), state.tokens());
    match auth.login(&username, &password).await {
        Ok(token) => {
            add_breadcrumb(
                "auth",
                "User logged in",
                Some(&[("username", username.as_str())]),
            );
            Ok(Json(LoginResponse { token }))
        }
        Err(e) => {
            tracing::info!(username = %username, error = %e, "Login failed");
            Err(e.into())
        }
    }
}

/// Handle refresh: exchange a refresh token for a new access token.
#[instrument(skip(state))]
pub async fn refresh(
    State(state): State<AppState>,
    RequireRefresh(user_id): RequireRefresh,
) -> Result<Json<RefreshResponse>> {
    let access_token = state.tokens().issue(user_id, TokenKind::Access)?;

    Ok(Json(RefreshResponse { access_token }))
}

/// Handle logout.
pub async fn logout(RequireAuth(user_id): RequireAuth) -> Json<Value> {
    tracing::info!(user_id = %user_id, "User logged out");
    clear_sentry_user();

    Json(json!({ "message": "Successfully logged out" }))
}
