//! Cart service: per-user cart mutation and the priced cart summary.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use bazaar_core::{CartItemId, ProductId, UserId, cart_total, round_for_display};

use crate::db::{RepositoryError, ShopStore};
use crate::models::{CartItem, CartLine};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity must be positive.
    #[error("quantity must be greater than zero")]
    InvalidQuantity,

    /// Product or cart item does not exist (or is not the caller's).
    #[error("product not found")]
    NotFound,

    /// The cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// One priced line of the cart summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price_per_item: Decimal,
    /// Line subtotal, rounded to 2 dp.
    pub total: Decimal,
}

/// The caller's cart with display totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSummary {
    pub items: Vec<SummaryLine>,
    /// Sum of unrounded subtotals, rounded to 2 dp.
    pub total: Decimal,
}

impl CartSummary {
    fn from_lines(lines: &[CartLine]) -> Self {
        let items = lines
            .iter()
            .map(|line| SummaryLine {
                product_id: line.product.id,
                product_name: line.product.name.clone(),
                quantity: line.quantity,
                price_per_item: line.product.price,
                total: round_for_display(line.subtotal()),
            })
            .collect();
        let total = cart_total(lines.iter().map(|l| (l.quantity, l.product.price)));

        Self {
            items,
            total: round_for_display(total),
        }
    }
}

/// Cart service.
pub struct CartService<'a> {
    store: &'a dyn ShopStore,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(store: &'a dyn ShopStore) -> Self {
        Self { store }
    }

    /// Add a line for `quantity` units of a product. Every add creates a new
    /// line, even for a product already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for non-positive quantities and
    /// `CartError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity);
        }

        self.store
            .add_cart_item(user_id, product_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::NotFound,
                other => CartError::Repository(other),
            })
    }

    /// Remove one of the caller's cart lines.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotFound` if the line does not exist or belongs to
    /// another user.
    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, item_id: CartItemId) -> Result<(), CartError> {
        if self.store.remove_cart_item(user_id, item_id).await? {
            Ok(())
        } else {
            Err(CartError::NotFound)
        }
    }

    /// The caller's cart priced at current catalog values.
    ///
    /// # Errors
    ///
    /// Returns `CartError::EmptyCart` if the cart has no lines.
    #[instrument(skip(self))]
    pub async fn summary(&self, user_id: UserId) -> Result<CartSummary, CartError> {
        let lines = self.store.cart_lines(user_id).await?;
        if lines.is_empty() {
            return Err(CartError::EmptyCart);
        }
        Ok(CartSummary::from_lines(&lines))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{CurrencyCode, Email, Username};

    use super::*;
    use crate::models::{NewProduct, NewUser, Product};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn user(store: &dyn ShopStore, name: &str) -> UserId {
        store
            .create_user(&NewUser {
                username: Username::parse(name).unwrap(),
                email: Email::parse(&format!("{name}@example.com")).unwrap(),
                password_hash: "hash".to_owned(),
            })
            .await
            .unwrap()
            .id
    }

    async fn product(store: &dyn ShopStore, name: &str, price: &str) -> Product {
        store
            .create_product(&NewProduct {
                name: name.to_owned(),
                amount: 10,
                price: dec(price),
                currency: CurrencyCode::DKK,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_summary_total() {
        let store = crate::db::MemoryStore::new();
        let anna = user(&store, "anna").await;
        let mug = product(&store, "Mug", "10.00").await;
        let plate = product(&store, "Plate", "4.99").await;

        let cart = CartService::new(&store);
        cart.add(anna, mug.id, 2).await.unwrap();
        cart.add(anna, plate.id, 1).await.unwrap();

        let summary = cart.summary(anna).await.unwrap();
        assert_eq!(summary.total, dec("24.99"));
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.items[0].total, dec("20.00"));
        assert_eq!(summary.items[1].price_per_item, dec("4.99"));
    }

    #[tokio::test]
    async fn test_summary_empty_cart() {
        let store = crate::db::MemoryStore::new();
        let anna = user(&store, "anna").await;
        assert!(matches!(
            CartService::new(&store).summary(anna).await,
            Err(CartError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_add_validates_quantity_and_product() {
        let store = crate::db::MemoryStore::new();
        let anna = user(&store, "anna").await;
        let mug = product(&store, "Mug", "10.00").await;
        let cart = CartService::new(&store);

        assert!(matches!(
            cart.add(anna, mug.id, 0).await,
            Err(CartError::InvalidQuantity)
        ));
        assert!(matches!(
            cart.add(anna, ProductId::new(999), 1).await,
            Err(CartError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_remove_other_users_item_is_not_found() {
        let store = crate::db::MemoryStore::new();
        let anna = user(&store, "anna").await;
        let bob = user(&store, "bob").await;
        let mug = product(&store, "Mug", "10.00").await;
        let cart = CartService::new(&store);

        let item = cart.add(anna, mug.id, 1).await.unwrap();
        assert!(matches!(
            cart.remove(bob, item.id).await,
            Err(CartError::NotFound)
        ));
        assert!(cart.remove(anna, item.id).await.is_ok());
    }
}
