//! Product queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::ProductId;

use super::{PgStore, parse_currency};
use crate::db::{ProductStore, RepositoryError, escape_like};
use crate::models::{NewProduct, Product, ProductUpdate};

const PRODUCT_COLUMNS: &str = "id, name, amount, price, currency, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(super) struct ProductRow {
    pub id: i32,
    pub name: String,
    pub amount: i32,
    pub price: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            amount: row.amount,
            price: row.price,
            currency: parse_currency(&row.currency)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

#[async_trait]
impl ProductStore for PgStore {
    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            r"
            INSERT INTO bazaar.products (name, amount, price, currency)
            VALUES ($1, $2, $3, $4)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(product.amount)
        .bind(product.price)
        .bind(product.currency.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM bazaar.products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, search: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = match search {
            Some(term) => {
                sqlx::query_as(&format!(
                    r"
                    SELECT {PRODUCT_COLUMNS} FROM bazaar.products
                    WHERE name ILIKE '%' || $1 || '%' ESCAPE '\'
                    ORDER BY id
                    "
                ))
                .bind(escape_like(term))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "SELECT {PRODUCT_COLUMNS} FROM bazaar.products ORDER BY id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        into_products(rows)
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE bazaar.products
            SET name = COALESCE($2, name),
                amount = COALESCE($3, amount),
                price = COALESCE($4, price),
                currency = COALESCE($5, currency)
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.amount)
        .bind(update.price)
        .bind(update.currency.as_ref().map(|c| c.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM bazaar.products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn low_stock_products(&self, threshold: i32) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS} FROM bazaar.products
            WHERE amount <= $1
            ORDER BY amount, id
            "
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        into_products(rows)
    }
}
