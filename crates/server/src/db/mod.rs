//! Persistence for the store.
//!
//! # Stores
//!
//! The services talk to storage through the [`ShopStore`] trait family, so the
//! same checkout and settlement code runs against:
//!
//! - [`PgStore`] - `PostgreSQL` via sqlx (production)
//! - [`MemoryStore`] - process-local maps (local development and tests)
//!
//! # Tables (schema `bazaar`)
//!
//! - `users` - Accounts with argon2 password hashes and the admin flag
//! - `products` - Catalog entries and stock counts
//! - `cart_items` - Per-user cart lines
//! - `payments` - Append-only payment ledger
//! - `processed_webhook_events` - Gateway event ids already settled
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p bazaar-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use bazaar_core::{CartItemId, ProductId, UserId, Username};

use crate::models::{
    CartItem, CartLine, NewPayment, NewProduct, NewUser, PaymentRecord, Product, ProductUpdate,
    User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested or referenced entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique username).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A computed value does not fit its column.
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Store Traits
// =============================================================================

/// Catalog reads and admin writes.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// All products ordered by id, optionally filtered by a case-insensitive
    /// substring of the name.
    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>, RepositoryError>;

    /// Returns `None` if the product does not exist.
    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Returns `false` if the product did not exist. Cart lines referencing
    /// the product are removed with it.
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;

    /// Products whose `amount <= threshold`.
    async fn low_stock_products(&self, threshold: i32) -> Result<Vec<Product>, RepositoryError>;
}

/// Per-user cart rows.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;

    /// Deletes the item only if `user_id` owns it. Returns whether a row was
    /// deleted; callers cannot tell "absent" from "owned by someone else".
    async fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<bool, RepositoryError>;

    /// The user's cart joined with current product values, oldest line first.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;
}

/// Accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns `RepositoryError::Conflict` if the username or email is taken.
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// The user and their password hash, for login.
    async fn get_user_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Returns `false` if no user has this username.
    async fn set_admin(&self, username: &Username, is_admin: bool)
    -> Result<bool, RepositoryError>;
}

/// Ledger reads. Writes only happen inside a [`SettlementTx`].
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Newest first.
    async fn payments_for_user(&self, user_id: UserId)
    -> Result<Vec<PaymentRecord>, RepositoryError>;
}

/// Entry point for the settlement unit of work.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, RepositoryError>;
}

/// One atomic settlement.
///
/// Every write becomes visible on [`SettlementTx::commit`]; dropping the
/// value without committing discards all of them. Stock rows returned by
/// [`SettlementTx::lock_cart_lines`] stay locked against other settlements
/// until the unit ends.
#[async_trait]
pub trait SettlementTx: Send {
    /// Record a gateway event id as processed. Returns `false` if it already
    /// was, in which case the caller should drop the unit.
    async fn claim_event(&mut self, event_id: &str) -> Result<bool, RepositoryError>;

    /// The user's cart lines with the referenced product rows locked.
    async fn lock_cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// `amount -= quantity` for a product. Returns the new amount, which may
    /// be negative.
    async fn debit_stock(
        &mut self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<i32, RepositoryError>;

    async fn append_payment(&mut self, payment: &NewPayment)
    -> Result<PaymentRecord, RepositoryError>;

    /// Returns the number of removed cart lines.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Everything the application needs from storage.
#[async_trait]
pub trait ShopStore: ProductStore + CartStore + UserStore + PaymentStore + SettlementStore {
    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Escape `LIKE` metacharacters so user search text matches literally.
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("mug"), "mug");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
