//! User domain types.

use chrono::{DateTime, Utc};

use bazaar_core::{Email, UserId, Username};

/// A registered shopper or administrator.
///
/// The password hash is deliberately not part of this type; it is only read
/// through `UserStore::get_user_credentials` during login.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: Username,
    /// Contact email address.
    pub email: Email,
    /// Whether the user may use the admin surface.
    pub is_admin: bool,
    /// When the user registered.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    /// Argon2 PHC string.
    pub password_hash: String,
}
