//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] bazaar_core::UsernameError),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] bazaar_core::EmailError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Username or email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Token is malformed, has a bad signature, or is the wrong kind.
    #[error("invalid token")]
    InvalidToken,

    /// Token has expired.
    #[error("token expired")]
    TokenExpired,

    /// Token could not be signed.
    #[error("token creation failed: {0}")]
    TokenCreation(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
