//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use bazaar_core::{CurrencyCode, ProductId};

/// A catalog product with its current stock level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Units in stock. Settlement may push this below zero when two buyers
    /// race for the last units; admin writes never do.
    pub amount: i32,
    /// Unit price in the currency's standard unit.
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether any stock is left.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.amount > 0
    }

    /// Whether stock is at or below the warning threshold.
    #[must_use]
    pub const fn is_low_stock(&self, threshold: i32) -> bool {
        self.amount <= threshold
    }
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub amount: i32,
    pub price: Decimal,
    pub currency: CurrencyCode,
}

/// Partial update of a product. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub amount: Option<i32>,
    pub price: Option<Decimal>,
    pub currency: Option<CurrencyCode>,
}

impl ProductUpdate {
    /// Apply this update to a product in place.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(amount) = self.amount {
            product.amount = amount;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(currency) = self.currency {
            product.currency = currency;
        }
    }
}
