//! Catalog service: public listing and admin inventory management.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use bazaar_core::{CurrencyCode, ProductId, round_for_display};

use crate::db::{RepositoryError, ShopStore};
use crate::models::{NewProduct, Product, ProductUpdate};

/// Maximum product name length.
const MAX_NAME_LENGTH: usize = 250;

/// Largest price the `NUMERIC(12,2)` column holds.
// 999_999_999_999 with scale 2 (`Decimal::new` is not const).
const MAX_PRICE: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// Product does not exist.
    #[error("product not found")]
    NotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Unvalidated product fields, as received from an admin or a seed file.
#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub name: Option<String>,
    pub amount: Option<i32>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
}

impl ProductDraft {
    /// Validate a draft for creation. Name, amount and price are required;
    /// currency defaults to DKK.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` describing the first invalid field.
    pub fn into_new_product(self) -> Result<NewProduct, CatalogError> {
        let (Some(name), Some(amount), Some(price)) = (self.name, self.amount, self.price) else {
            return Err(CatalogError::Validation(
                "Missing required fields".to_owned(),
            ));
        };

        Ok(NewProduct {
            name: validate_name(&name)?,
            amount: validate_amount(amount)?,
            price: validate_price(price)?,
            currency: self
                .currency
                .as_deref()
                .map(validate_currency)
                .transpose()?
                .unwrap_or_default(),
        })
    }

    /// Validate a draft as a partial update. Absent fields stay unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` describing the first invalid field.
    pub fn into_update(self) -> Result<ProductUpdate, CatalogError> {
        Ok(ProductUpdate {
            name: self.name.as_deref().map(validate_name).transpose()?,
            amount: self.amount.map(validate_amount).transpose()?,
            price: self.price.map(validate_price).transpose()?,
            currency: self.currency.as_deref().map(validate_currency).transpose()?,
        })
    }
}

fn validate_name(name: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::Validation(
            "product name cannot be empty".to_owned(),
        ));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(CatalogError::Validation(format!(
            "product name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}

fn validate_amount(amount: i32) -> Result<i32, CatalogError> {
    if amount < 0 {
        return Err(CatalogError::Validation(
            "amount cannot be negative".to_owned(),
        ));
    }
    Ok(amount)
}

fn validate_price(price: Decimal) -> Result<Decimal, CatalogError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(CatalogError::Validation(
            "price cannot be negative".to_owned(),
        ));
    }
    let price = round_for_display(price);
    if price > MAX_PRICE {
        return Err(CatalogError::Validation(format!(
            "price must be at most {MAX_PRICE}"
        )));
    }
    Ok(price)
}

fn validate_currency(currency: &str) -> Result<CurrencyCode, CatalogError> {
    CurrencyCode::parse(currency).map_err(|e| CatalogError::Validation(e.to_string()))
}

/// Catalog service.
pub struct CatalogService<'a> {
    store: &'a dyn ShopStore,
    low_stock_threshold: i32,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(store: &'a dyn ShopStore, low_stock_threshold: i32) -> Self {
        Self {
            store,
            low_stock_threshold,
        }
    }

    /// List products, optionally filtered by a case-insensitive name search.
    /// Blank search text lists everything.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    #[instrument(skip(self))]
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Product>, CatalogError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self.store.list_products(search).await?)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid drafts.
    #[instrument(skip(self))]
    pub async fn create(&self, draft: ProductDraft) -> Result<Product, CatalogError> {
        let new_product = draft.into_new_product()?;
        let product = self.store.create_product(&new_product).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Apply a partial update and warn if the product is now low on stock.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn update(&self, id: ProductId, draft: ProductDraft) -> Result<Product, CatalogError> {
        let update = draft.into_update()?;
        let product = self
            .store
            .update_product(id, &update)
            .await?
            .ok_or(CatalogError::NotFound)?;

        self.warn_if_low(&product);
        Ok(product)
    }

    /// Delete a product and any cart lines referencing it.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        if self.store.delete_product(id).await? {
            tracing::info!(product_id = %id, "Product deleted");
            Ok(())
        } else {
            Err(CatalogError::NotFound)
        }
    }

    /// Products at or below the low-stock threshold.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the store fails.
    pub async fn low_stock(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .store
            .low_stock_products(self.low_stock_threshold)
            .await?)
    }

    fn warn_if_low(&self, product: &Product) {
        warn_if_low_stock(product.id, &product.name, product.amount, self.low_stock_threshold);
    }
}

/// Log a low-stock warning if `amount` is at or below `threshold`.
pub(crate) fn warn_if_low_stock(id: ProductId, name: &str, amount: i32, threshold: i32) {
    if amount <= threshold {
        tracing::warn!(
            product_id = %id,
            product = %name,
            amount,
            threshold,
            "Low stock"
        );
    }
}
