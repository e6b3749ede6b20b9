//! Settlement: turn a completed checkout session into stock debits, a ledger
//! entry and an empty cart, all in one unit of work.
//!
//! Redelivered events are no-ops: the event id is claimed inside the same
//! unit, and a cart that is already empty is acknowledged without writing a
//! payment.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::instrument;

use bazaar_core::{ProductId, UserId, cart_total, round_for_display};

use crate::db::{RepositoryError, SettlementStore};
use crate::models::{NewPayment, PaymentRecord};
use crate::payments::WebhookEvent;
use crate::services::catalog::warn_if_low_stock;

/// Metadata key carrying the buyer's user id.
pub const USER_ID_METADATA_KEY: &str = "user_id";

/// Errors from settlement. Every variant makes the gateway retry.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The session metadata has no usable user id.
    #[error("event {event_id} has no valid user_id metadata")]
    MissingUserId {
        /// Gateway event id.
        event_id: String,
    },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What a settlement run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Not a checkout completion; nothing to do.
    Ignored,
    /// This event was settled before.
    Duplicate,
    /// The buyer's cart was already empty.
    NothingToSettle,
    /// Stock debited, payment recorded, cart cleared.
    Settled(PaymentRecord),
}

/// Settlement service.
pub struct SettlementService<'a> {
    store: &'a dyn SettlementStore,
    low_stock_threshold: i32,
}

impl<'a> SettlementService<'a> {
    /// Create a new settlement service.
    #[must_use]
    pub const fn new(store: &'a dyn SettlementStore, low_stock_threshold: i32) -> Self {
        Self {
            store,
            low_stock_threshold,
        }
    }

    /// Settle a verified gateway event.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError` if the event cannot be attributed to a user
    /// or any store write fails. Nothing is persisted in either case.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn settle(&self, event: &WebhookEvent) -> Result<SettlementOutcome, SettlementError> {
        if !event.is_checkout_completed() {
            tracing::debug!("Ignoring event type");
            return Ok(SettlementOutcome::Ignored);
        }

        let user_id: UserId = event
            .metadata_value(USER_ID_METADATA_KEY)
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| SettlementError::MissingUserId {
                event_id: event.id.clone(),
            })?;

        let mut tx = self.store.begin_settlement().await?;

        if !tx.claim_event(&event.id).await? {
            tracing::info!(user_id = %user_id, "Event already settled");
            return Ok(SettlementOutcome::Duplicate);
        }

        let lines = tx.lock_cart_lines(user_id).await?;
        let Some(first) = lines.first() else {
            tx.commit().await?;
            tracing::info!(user_id = %user_id, "Cart already empty, nothing to settle");
            return Ok(SettlementOutcome::NothingToSettle);
        };
        let currency = first.product.currency;

        // Last post-debit amount per product, for warnings after commit.
        let mut remaining: BTreeMap<ProductId, (String, i32)> = BTreeMap::new();
        for line in &lines {
            let amount = tx.debit_stock(line.product.id, line.quantity).await?;
            if amount < 0 {
                tracing::error!(
                    user_id = %user_id,
                    product_id = %line.product.id,
                    product = %line.product.name,
                    quantity = line.quantity,
                    amount,
                    "Product oversold"
                );
            }
            remaining.insert(line.product.id, (line.product.name.clone(), amount));
        }

        let total = round_for_display(cart_total(
            lines.iter().map(|line| (line.quantity, line.product.price)),
        ));

        let payment = tx
            .append_payment(&NewPayment {
                user_id,
                total,
                currency,
                gateway_event_id: event.id.clone(),
                gateway_session_id: event.session_id().to_owned(),
            })
            .await?;
        tx.clear_cart(user_id).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            payment_id = %payment.id,
            total = %payment.total,
            currency = %payment.currency,
            "Payment settled"
        );

        for (product_id, (name, amount)) in &remaining {
            warn_if_low_stock(*product_id, name, *amount, self.low_stock_threshold);
        }

        Ok(SettlementOutcome::Settled(payment))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use bazaar_core::{CurrencyCode, Email, Username};

    use super::*;
    use crate::db::{CartStore, MemoryStore, PaymentStore, ProductStore, SettlementTx, UserStore};
    use crate::models::{CartLine, NewProduct, NewUser, Product};

    fn event(id: &str, user_id: &str) -> WebhookEvent {
        let body = format!(
            r#"{{"id":"{id}","type":"checkout.session.completed",
                "data":{{"object":{{"id":"cs_1","metadata":{{"user_id":"{user_id}"}}}}}}}}"#
        );
        WebhookEvent::parse(body.as_bytes()).unwrap()
    }

    async fn setup(store: &MemoryStore) -> (UserId, Product, Product) {
        let user = store
            .create_user(&NewUser {
                username: Username::parse("anna").unwrap(),
                email: Email::parse("anna@example.com").unwrap(),
                password_hash: "hash".to_owned(),
            })
            .await
            .unwrap();
        let mug = store
            .create_product(&NewProduct {
                name: "Mug".to_owned(),
                amount: 5,
                price: Decimal::new(1000, 2),
                currency: CurrencyCode::DKK,
            })
            .await
            .unwrap();
        let plate = store
            .create_product(&NewProduct {
                name: "Plate".to_owned(),
                amount: 3,
                price: Decimal::new(499, 2),
                currency: CurrencyCode::DKK,
            })
            .await
            .unwrap();
        store.add_cart_item(user.id, mug.id, 2).await.unwrap();
        store.add_cart_item(user.id, plate.id, 1).await.unwrap();
        (user.id, mug, plate)
    }

    async fn amount(store: &MemoryStore, id: ProductId) -> i32 {
        store.get_product(id).await.unwrap().unwrap().amount
    }

    #[tokio::test]
    async fn test_settle_debits_records_and_clears() {
        let store = MemoryStore::new();
        let (user_id, mug, plate) = setup(&store).await;

        let outcome = SettlementService::new(&store, 2)
            .settle(&event("evt_1", &user_id.to_string()))
            .await
            .unwrap();

        let SettlementOutcome::Settled(payment) = outcome else {
            panic!("expected settlement, got {outcome:?}");
        };
        assert_eq!(payment.total, Decimal::new(2499, 2));
        assert_eq!(payment.currency, CurrencyCode::DKK);
        assert_eq!(payment.gateway_session_id, "cs_1");
        assert_eq!(amount(&store, mug.id).await, 3);
        assert_eq!(amount(&store, plate.id).await, 2);
        assert!(store.cart_lines(user_id).await.unwrap().is_empty());
        assert_eq!(store.payments_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_replay_is_noop() {
        let store = MemoryStore::new();
        let (user_id, mug, _) = setup(&store).await;
        let service = SettlementService::new(&store, 2);
        let evt = event("evt_1", &user_id.to_string());

        service.settle(&evt).await.unwrap();
        // Same product added again after payment must not be charged by a replay.
        store.add_cart_item(user_id, mug.id, 1).await.unwrap();
        assert_eq!(
            service.settle(&evt).await.unwrap(),
            SettlementOutcome::Duplicate
        );

        assert_eq!(amount(&store, mug.id).await, 3);
        assert_eq!(store.payments_for_user(user_id).await.unwrap().len(), 1);
        assert_eq!(store.cart_lines(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_distinct_event_with_empty_cart() {
        let store = MemoryStore::new();
        let (user_id, mug, _) = setup(&store).await;
        let service = SettlementService::new(&store, 2);

        service
            .settle(&event("evt_1", &user_id.to_string()))
            .await
            .unwrap();
        assert_eq!(
            service
                .settle(&event("evt_2", &user_id.to_string()))
                .await
                .unwrap(),
            SettlementOutcome::NothingToSettle
        );
        assert_eq!(amount(&store, mug.id).await, 3);
        assert_eq!(store.payments_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settle_ignores_other_event_types() {
        let store = MemoryStore::new();
        let evt = WebhookEvent::parse(br#"{"id":"evt_9","type":"payment_intent.created"}"#)
            .unwrap();
        assert_eq!(
            SettlementService::new(&store, 2).settle(&evt).await.unwrap(),
            SettlementOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_settle_missing_user_id() {
        let store = MemoryStore::new();
        for user_id in ["", "abc"] {
            let result = SettlementService::new(&store, 2)
                .settle(&event("evt_1", user_id))
                .await;
            assert!(matches!(
                result,
                Err(SettlementError::MissingUserId { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_settle_oversell_still_debits() {
        let store = MemoryStore::new();
        let (user_id, mug, _) = setup(&store).await;
        // Stock dropped after checkout but before payment completed.
        store
            .update_product(
                mug.id,
                &crate::models::ProductUpdate {
                    amount: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        SettlementService::new(&store, 2)
            .settle(&event("evt_1", &user_id.to_string()))
            .await
            .unwrap();
        assert_eq!(amount(&store, mug.id).await, -1);
    }

    #[tokio::test]
    async fn test_settle_stock_overflow_fails_without_writes() {
        let store = MemoryStore::new();
        let (user_id, _, _) = setup(&store).await;
        let bulk = store
            .create_product(&NewProduct {
                name: "Pallet".to_owned(),
                amount: i32::MAX,
                price: Decimal::ONE,
                currency: CurrencyCode::DKK,
            })
            .await
            .unwrap();
        for _ in 0..3 {
            store.add_cart_item(user_id, bulk.id, i32::MAX).await.unwrap();
        }

        let result = SettlementService::new(&store, 2)
            .settle(&event("evt_1", &user_id.to_string()))
            .await;
        assert!(matches!(
            result,
            Err(SettlementError::Repository(RepositoryError::OutOfRange(_)))
        ));
        assert_eq!(amount(&store, bulk.id).await, i32::MAX);
        assert_eq!(store.cart_lines(user_id).await.unwrap().len(), 5);
        assert!(store.payments_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deliveries_debit_once_per_event() {
        let store = MemoryStore::new();
        let product = store
            .create_product(&NewProduct {
                name: "Mug".to_owned(),
                amount: 1000,
                price: Decimal::new(1000, 2),
                currency: CurrencyCode::DKK,
            })
            .await
            .unwrap();

        let mut buyers = Vec::new();
        for i in 0..50 {
            let user = store
                .create_user(&NewUser {
                    username: Username::parse(&format!("buyer{i}")).unwrap(),
                    email: Email::parse(&format!("buyer{i}@example.com")).unwrap(),
                    password_hash: "hash".to_owned(),
                })
                .await
                .unwrap();
            store.add_cart_item(user.id, product.id, 3).await.unwrap();
            buyers.push(user.id);
        }

        let mut handles = Vec::new();
        for (i, user_id) in buyers.iter().enumerate() {
            let evt = event(&format!("evt_{i}"), &user_id.to_string());
            for _ in 0..2 {
                let store = store.clone();
                let evt = evt.clone();
                handles.push(tokio::spawn(async move {
                    SettlementService::new(&store, 2).settle(&evt).await
                }));
            }
        }

        let mut settled = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                SettlementOutcome::Settled(_) => settled += 1,
                SettlementOutcome::Duplicate => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(settled, 50);
        assert_eq!(amount(&store, product.id).await, 850);

        let mut payments = 0;
        for user_id in buyers {
            payments += store.payments_for_user(user_id).await.unwrap().len();
            assert!(store.cart_lines(user_id).await.unwrap().is_empty());
        }
        assert_eq!(payments, 50);
    }

    /// Delegates to a memory store but fails when the payment is appended.
    struct FailingLedger(MemoryStore);

    struct FailingTx(Box<dyn SettlementTx>);

    #[async_trait]
    impl SettlementStore for FailingLedger {
        async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, RepositoryError> {
            Ok(Box::new(FailingTx(self.0.begin_settlement().await?)))
        }
    }

    #[async_trait]
    impl SettlementTx for FailingTx {
        async fn claim_event(&mut self, event_id: &str) -> Result<bool, RepositoryError> {
            self.0.claim_event(event_id).await
        }

        async fn lock_cart_lines(
            &mut self,
            user_id: UserId,
        ) -> Result<Vec<CartLine>, RepositoryError> {
            self.0.lock_cart_lines(user_id).await
        }

        async fn debit_stock(
            &mut self,
            product_id: ProductId,
            quantity: i32,
        ) -> Result<i32, RepositoryError> {
            self.0.debit_stock(product_id, quantity).await
        }

        async fn append_payment(
            &mut self,
            _payment: &NewPayment,
        ) -> Result<PaymentRecord, RepositoryError> {
            Err(RepositoryError::DataCorruption("ledger unavailable".to_owned()))
        }

        async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
            self.0.clear_cart(user_id).await
        }

        async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
            self.0.commit().await
        }
    }

    #[tokio::test]
    async fn test_failure_inside_unit_leaves_state_intact() {
        let store = MemoryStore::new();
        let (user_id, mug, plate) = setup(&store).await;
        let failing = FailingLedger(store.clone());

        let result = SettlementService::new(&failing, 2)
            .settle(&event("evt_1", &user_id.to_string()))
            .await;
        assert!(matches!(result, Err(SettlementError::Repository(_))));

        assert_eq!(amount(&store, mug.id).await, 5);
        assert_eq!(amount(&store, plate.id).await, 3);
        assert_eq!(store.cart_lines(user_id).await.unwrap().len(), 2);
        assert!(store.payments_for_user(user_id).await.unwrap().is_empty());

        // The event was not consumed, so a retry settles normally.
        let outcome = SettlementService::new(&store, 2)
            .settle(&event("evt_1", &user_id.to_string()))
            .await
            .unwrap();
        assert!(matches!(outcome, SettlementOutcome::Settled(_)));
    }
}
