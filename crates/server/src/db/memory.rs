//! In-process store for local development and tests.
//!
//! All state sits behind one async mutex. A settlement holds the lock for its
//! whole lifetime and works on a staged copy, so it is atomic and serialized
//! against every other write, mirroring the row locks the `PostgreSQL`
//! store takes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use bazaar_core::{CartItemId, PaymentId, ProductId, UserId, Username};

use super::{
    CartStore, PaymentStore, ProductStore, RepositoryError, SettlementStore, SettlementTx,
    ShopStore, UserStore,
};
use crate::models::{
    CartItem, CartLine, NewPayment, NewProduct, NewUser, PaymentRecord, Product, ProductUpdate,
    User,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, StoredUser>,
    products: BTreeMap<ProductId, Product>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    payments: BTreeMap<PaymentId, PaymentRecord>,
    processed_events: HashSet<String>,
    next_user_id: i32,
    next_product_id: i32,
    next_cart_item_id: i32,
    next_payment_id: i32,
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

impl MemoryState {
    fn lines_for(&self, user_id: UserId) -> Vec<CartLine> {
        self.cart_items
            .values()
            .filter(|item| item.user_id == user_id)
            .filter_map(|item| {
                self.products.get(&item.product_id).map(|product| CartLine {
                    item_id: item.id,
                    quantity: item.quantity,
                    product: product.clone(),
                })
            })
            .collect()
    }

    fn user_by_name_mut(&mut self, username: &Username) -> Option<&mut StoredUser> {
        self.users
            .values_mut()
            .find(|stored| stored.user.username == *username)
    }
}

/// Store that keeps everything in process memory.
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let id = ProductId::new(next_id(&mut state.next_product_id));
        let created = Product {
            id,
            name: product.name.clone(),
            amount: product.amount,
            price: product.price,
            currency: product.currency,
            created_at: now,
            updated_at: now,
        };
        state.products.insert(id, created.clone());
        Ok(created)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        let needle = search.map(str::to_lowercase);
        let state = self.state.lock().await;
        Ok(state
            .products
            .values()
            .filter(|p| {
                needle
                    .as_deref()
                    .is_none_or(|n| p.name.to_lowercase().contains(n))
            })
            .cloned()
            .collect())
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(product);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.products.remove(&id).is_none() {
            return Ok(false);
        }
        state.cart_items.retain(|_, item| item.product_id != id);
        Ok(true)
    }

    async fn low_stock_products(&self, threshold: i32) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.lock().await;
        let mut low: Vec<Product> = state
            .products
            .values()
            .filter(|p| p.is_low_stock(threshold))
            .cloned()
            .collect();
        low.sort_by_key(|p| (p.amount, p.id));
        Ok(low)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&product_id) || !state.users.contains_key(&user_id) {
            return Err(RepositoryError::NotFound);
        }
        let item = CartItem {
            id: CartItemId::new(next_id(&mut state.next_cart_item_id)),
            user_id,
            product_id,
            quantity,
        };
        state.cart_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let owned = state
            .cart_items
            .get(&item_id)
            .is_some_and(|item| item.user_id == user_id);
        if owned {
            state.cart_items.remove(&item_id);
        }
        Ok(owned)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        Ok(self.state.lock().await.lines_for(user_id))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.lock().await;
        let taken = state.users.values().any(|stored| {
            stored.user.username == user.username || stored.user.email == user.email
        });
        if taken {
            return Err(RepositoryError::Conflict("user already exists".to_owned()));
        }
        let created = User {
            id: UserId::new(next_id(&mut state.next_user_id)),
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: false,
            created_at: Utc::now(),
        };
        state.users.insert(
            created.id,
            StoredUser {
                user: created.clone(),
                password_hash: user.password_hash.clone(),
            },
        );
        Ok(created)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).map(|stored| stored.user.clone()))
    }

    async fn get_user_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|stored| stored.user.username == *username)
            .map(|stored| (stored.user.clone(), stored.password_hash.clone())))
    }

    async fn set_admin(&self, username: &Username, is_admin: bool) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        match state.user_by_name_mut(username) {
            Some(stored) => {
                stored.user.is_admin = is_admin;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn payments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PaymentRecord>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// Settlement against a staged copy of the state.
pub struct MemorySettlement {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemorySettlement { guard, staged }))
    }
}

#[async_trait]
impl SettlementTx for MemorySettlement {
    async fn claim_event(&mut self, event_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.staged.processed_events.insert(event_id.to_owned()))
    }

    async fn lock_cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        Ok(self.staged.lines_for(user_id))
    }

    async fn debit_stock(
        &mut self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let product = self
            .staged
            .products
            .get_mut(&product_id)
            .ok_or(RepositoryError::NotFound)?;
        product.amount = product.amount.checked_sub(quantity).ok_or_else(|| {
            RepositoryError::OutOfRange(format!("stock for product {product_id}"))
        })?;
        product.updated_at = Utc::now();
        Ok(product.amount)
    }

    async fn append_payment(
        &mut self,
        payment: &NewPayment,
    ) -> Result<PaymentRecord, RepositoryError> {
        let record = PaymentRecord {
            id: PaymentId::new(next_id(&mut self.staged.next_payment_id)),
            user_id: payment.user_id,
            total: payment.total,
            currency: payment.currency,
            gateway_event_id: payment.gateway_event_id.clone(),
            gateway_session_id: payment.gateway_session_id.clone(),
            created_at: Utc::now(),
        };
        self.staged.payments.insert(record.id, record.clone());
        Ok(record)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
        let before = self.staged.cart_items.len();
        self.staged
            .cart_items
            .retain(|_, item| item.user_id != user_id);
        Ok(u64::try_from(before - self.staged.cart_items.len()).unwrap_or(u64::MAX))
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl ShopStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{CurrencyCode, Email};
    use rust_decimal::Decimal;

    use super::*;

    async fn seed(store: &MemoryStore, amount: i32) -> (User, Product) {
        let user = store
            .create_user(&NewUser {
                username: Username::parse("anna").unwrap(),
                email: Email::parse("anna@example.com").unwrap(),
                password_hash: "hash".to_owned(),
            })
            .await
            .unwrap();
        let product = store
            .create_product(&NewProduct {
                name: "Mug".to_owned(),
                amount,
                price: Decimal::new(1000, 2),
                currency: CurrencyCode::DKK,
            })
            .await
            .unwrap();
        (user, product)
    }

    #[tokio::test]
    async fn test_create_user_conflict() {
        let store = MemoryStore::new();
        seed(&store, 1).await;
        let err = store
            .create_user(&NewUser {
                username: Username::parse("anna").unwrap(),
                email: Email::parse("other@example.com").unwrap(),
                password_hash: "hash".to_owned(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = MemoryStore::new();
        seed(&store, 1).await;
        assert_eq!(store.list_products(Some("MU")).await.unwrap().len(), 1);
        assert!(store.list_products(Some("plate")).await.unwrap().is_empty());
        assert_eq!(store.list_products(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_cart_item_checks_owner() {
        let store = MemoryStore::new();
        let (user, product) = seed(&store, 5).await;
        let item = store.add_cart_item(user.id, product.id, 1).await.unwrap();

        assert!(!store.remove_cart_item(UserId::new(999), item.id).await.unwrap());
        assert!(store.remove_cart_item(user.id, item.id).await.unwrap());
        assert!(!store.remove_cart_item(user.id, item.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_cart_item_unknown_product() {
        let store = MemoryStore::new();
        let (user, _) = seed(&store, 5).await;
        let err = store
            .add_cart_item(user.id, ProductId::new(42), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_product_cascades_to_carts() {
        let store = MemoryStore::new();
        let (user, product) = seed(&store, 5).await;
        store.add_cart_item(user.id, product.id, 1).await.unwrap();

        assert!(store.delete_product(product.id).await.unwrap());
        assert!(store.cart_lines(user.id).await.unwrap().is_empty());
        assert!(!store.delete_product(product.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_settlement_dropped_without_commit_rolls_back() {
        let store = MemoryStore::new();
        let (user, product) = seed(&store, 5).await;
        store.add_cart_item(user.id, product.id, 2).await.unwrap();

        {
            let mut tx = store.begin_settlement().await.unwrap();
            assert!(tx.claim_event("evt_1").await.unwrap());
            tx.debit_stock(product.id, 2).await.unwrap();
            tx.clear_cart(user.id).await.unwrap();
        }

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().amount, 5);
        assert_eq!(store.cart_lines(user.id).await.unwrap().len(), 1);

        let mut tx = store.begin_settlement().await.unwrap();
        assert!(tx.claim_event("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_settlement_commit_applies_writes() {
        let store = MemoryStore::new();
        let (user, product) = seed(&store, 1).await;
        store.add_cart_item(user.id, product.id, 3).await.unwrap();

        let mut tx = store.begin_settlement().await.unwrap();
        assert!(tx.claim_event("evt_1").await.unwrap());
        let lines = tx.lock_cart_lines(user.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(tx.debit_stock(product.id, 3).await.unwrap(), -2);
        assert_eq!(tx.clear_cart(user.id).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().amount, -2);
        let mut tx = store.begin_settlement().await.unwrap();
        assert!(!tx.claim_event("evt_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_debit_stock_overflow_is_an_error() {
        let store = MemoryStore::new();
        let (_, product) = seed(&store, -2).await;

        let mut tx = store.begin_settlement().await.unwrap();
        let err = tx.debit_stock(product.id, i32::MAX).await.unwrap_err();
        assert!(matches!(err, RepositoryError::OutOfRange(_)));
        drop(tx);

        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().amount, -2);
    }
}
