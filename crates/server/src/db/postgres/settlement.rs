//! Settlement unit of work on a single database transaction.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use bazaar_core::{ProductId, UserId};

use super::PgStore;
use super::cart::{CART_LINE_SELECT, CartLineRow, into_lines};
use super::payments::{PAYMENT_COLUMNS, PaymentRow};
use crate::db::{RepositoryError, SettlementStore, SettlementTx};
use crate::models::{CartLine, NewPayment, PaymentRecord};

/// A settlement running inside one transaction.
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PgSettlement {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SettlementStore for PgStore {
    async fn begin_settlement(&self) -> Result<Box<dyn SettlementTx>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSettlement { tx }))
    }
}

#[async_trait]
impl SettlementTx for PgSettlement {
    async fn claim_event(&mut self, event_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO bazaar.processed_webhook_events (event_id)
            VALUES ($1)
            ON CONFLICT (event_id) DO NOTHING
            ",
        )
        .bind(event_id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn lock_cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        // Lock in product id order so concurrent settlements cannot deadlock.
        let rows: Vec<CartLineRow> = sqlx::query_as(&format!(
            "{CART_LINE_SELECT} WHERE c.user_id = $1 ORDER BY p.id, c.id FOR UPDATE OF p, c"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut lines = into_lines(rows)?;
        lines.sort_by_key(|line| line.item_id);
        Ok(lines)
    }

    async fn debit_stock(
        &mut self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let amount: Option<i32> = sqlx::query_scalar(
            "UPDATE bazaar.products SET amount = amount - $2 WHERE id = $1 RETURNING amount",
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?;

        amount.ok_or(RepositoryError::NotFound)
    }

    async fn append_payment(
        &mut self,
        payment: &NewPayment,
    ) -> Result<PaymentRecord, RepositoryError> {
        let row: PaymentRow = sqlx::query_as(&format!(
            r"
            INSERT INTO bazaar.payments
                (user_id, total, currency, gateway_event_id, gateway_session_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(payment.user_id)
        .bind(payment.total)
        .bind(payment.currency.as_str())
        .bind(&payment.gateway_event_id)
        .bind(&payment.gateway_session_id)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM bazaar.cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
