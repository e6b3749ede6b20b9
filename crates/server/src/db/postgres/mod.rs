//! `PostgreSQL` implementation of the store traits.
//!
//! Queries use runtime-checked `sqlx::query_as` with private `FromRow` row
//! types, converted into domain models at the boundary. Values that fail
//! domain validation on the way out are reported as
//! [`RepositoryError::DataCorruption`].

mod cart;
mod payments;
mod products;
mod settlement;
mod users;

use async_trait::async_trait;
use sqlx::PgPool;

use bazaar_core::CurrencyCode;

use super::{RepositoryError, ShopStore};

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ShopStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_currency(raw: &str) -> Result<CurrencyCode, RepositoryError> {
    CurrencyCode::parse(raw)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid currency in database: {e}")))
}
