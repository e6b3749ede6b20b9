//! Cart queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{CartItemId, ProductId, UserId};

use super::products::ProductRow;
use super::PgStore;
use crate::db::{CartStore, RepositoryError};
use crate::models::{CartItem, CartLine, Product};

/// Selects cart lines joined with their products. Callers append the
/// `WHERE` clause and any locking.
pub(super) const CART_LINE_SELECT: &str = r"
    SELECT c.id AS item_id, c.quantity,
           p.id, p.name, p.amount, p.price, p.currency, p.created_at, p.updated_at
    FROM bazaar.cart_items c
    JOIN bazaar.products p ON p.id = c.product_id
";

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    user_id: i32,
    product_id: i32,
    quantity: i32,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            user_id: UserId::new(row.user_id),
            product_id: ProductId::new(row.product_id),
            quantity: row.quantity,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct CartLineRow {
    item_id: i32,
    quantity: i32,
    id: i32,
    name: String,
    amount: i32,
    price: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let product = Product::try_from(ProductRow {
            id: row.id,
            name: row.name,
            amount: row.amount,
            price: row.price,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })?;

        Ok(Self {
            item_id: CartItemId::new(row.item_id),
            quantity: row.quantity,
            product,
        })
    }
}

pub(super) fn into_lines(rows: Vec<CartLineRow>) -> Result<Vec<CartLine>, RepositoryError> {
    rows.into_iter().map(CartLine::try_from).collect()
}

#[async_trait]
impl CartStore for PgStore {
    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        let row: CartItemRow = sqlx::query_as(
            r"
            INSERT INTO bazaar.cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, product_id, quantity
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    async fn remove_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM bazaar.cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<CartLineRow> =
            sqlx::query_as(&format!("{CART_LINE_SELECT} WHERE c.user_id = $1 ORDER BY c.id"))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        into_lines(rows)
    }
}
