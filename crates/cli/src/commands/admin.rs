//! Admin role management.
//!
//! Users register through the API; this command is the only way to flip
//! their `is_admin` flag.

use thiserror::Error;

use bazaar_core::{Username, UsernameError};
use bazaar_server::db::{PgStore, RepositoryError, UserStore};

use super::{DatabaseError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Could not reach the database.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The username is not well-formed.
    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    /// No such user.
    #[error("No user named {0}")]
    UnknownUser(String),

    /// Repository error.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Grant (`true`) or revoke (`false`) the admin role.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if no account has that username.
pub async fn set_admin(username: &str, is_admin: bool) -> Result<(), AdminError> {
    let username = Username::parse(username)?;
    let store = PgStore::new(connect().await?);

    if !store.set_admin(&username, is_admin).await? {
        return Err(AdminError::UnknownUser(username.as_str().to_owned()));
    }

    tracing::info!(username = %username.as_str(), is_admin, "Admin role updated");
    Ok(())
}
