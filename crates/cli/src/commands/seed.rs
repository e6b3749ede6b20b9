//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Coffee Mug
//!     amount: 12
//!     price: "89.95"
//!     currency: DKK   # optional, defaults to DKK
//! ```
//!
//! Every entry is validated before anything is written.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use bazaar_server::db::PgStore;
use bazaar_server::services::catalog::{CatalogError, CatalogService, ProductDraft};

use super::{DatabaseError, connect};

/// Low-stock threshold is irrelevant for inserts.
const SEED_LOW_STOCK_THRESHOLD: i32 = 0;

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The file is not valid YAML for a catalog.
    #[error("Invalid catalog file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An entry failed validation.
    #[error("Product #{index} is invalid: {source}")]
    Invalid { index: usize, source: CatalogError },

    /// Could not reach the database.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Insert failed.
    #[error("Failed to insert product: {0}")]
    Catalog(#[from] CatalogError),
}

/// A catalog seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<SeedProduct>,
}

/// One product entry in a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedProduct {
    pub name: Option<String>,
    pub amount: Option<i32>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
}

impl From<SeedProduct> for ProductDraft {
    fn from(product: SeedProduct) -> Self {
        Self {
            name: product.name,
            amount: product.amount,
            price: product.price,
            currency: product.currency,
        }
    }
}

/// Parse and validate a catalog file without touching the database.
///
/// # Errors
///
/// Returns `SeedError::Parse` for malformed YAML and `SeedError::Invalid`
/// naming the first entry that fails validation (1-based).
pub fn parse_catalog(content: &str) -> Result<Vec<ProductDraft>, SeedError> {
    let file: CatalogFile = serde_yaml::from_str(content)?;

    let drafts: Vec<ProductDraft> = file.products.into_iter().map(ProductDraft::from).collect();
    for (i, draft) in drafts.iter().enumerate() {
        draft
            .clone()
            .into_new_product()
            .map_err(|source| SeedError::Invalid {
                index: i + 1,
                source,
            })?;
    }
    Ok(drafts)
}

/// Insert every product in the file. Returns how many were inserted.
///
/// # Errors
///
/// Returns `SeedError` if the file is unreadable or invalid, or an insert fails.
pub async fn products(file_path: &str) -> Result<usize, SeedError> {
    let content = tokio::fs::read_to_string(Path::new(file_path))
        .await
        .map_err(|source| SeedError::Read {
            path: file_path.to_owned(),
            source,
        })?;
    let drafts = parse_catalog(&content)?;
    tracing::info!(path = %file_path, count = drafts.len(), "Parsed catalog file");

    let store = PgStore::new(connect().await?);
    let catalog = CatalogService::new(&store, SEED_LOW_STOCK_THRESHOLD);

    let count = drafts.len();
    for draft in drafts {
        catalog.create(draft).await?;
    }
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::CurrencyCode;

    use super::*;

    #[test]
    fn test_parse_catalog() {
        let drafts = parse_catalog(
            r#"
products:
  - name: Coffee Mug
    amount: 12
    price: "89.95"
  - name: Tea Pot
    amount: 3
    price: 249
    currency: eur
"#,
        )
        .unwrap();

        assert_eq!(drafts.len(), 2);
        let mug = drafts[0].clone().into_new_product().unwrap();
        assert_eq!(mug.currency, CurrencyCode::DKK);
        assert_eq!(mug.price, "89.95".parse::<Decimal>().unwrap());
        let pot = drafts[1].clone().into_new_product().unwrap();
        assert_eq!(pot.currency.as_str(), "EUR");
    }

    #[test]
    fn test_parse_catalog_reports_invalid_entry() {
        let result = parse_catalog(
            r"
products:
  - name: Coffee Mug
    amount: 12
    price: 10
  - name: Broken
    amount: -1
    price: 10
",
        );
        assert!(matches!(result, Err(SeedError::Invalid { index: 2, .. })));
    }
}
