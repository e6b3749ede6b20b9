//! Subcommand implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by every command that talks to the database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connect(#[from] sqlx::Error),
}

/// Connect to the store database named by the environment.
///
/// # Errors
///
/// Returns `DatabaseError` if no URL is configured or the connection fails.
pub async fn connect() -> Result<PgPool, DatabaseError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BAZAAR_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| DatabaseError::MissingEnvVar("BAZAAR_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(bazaar_server::db::create_pool(&database_url).await?)
}
