//! Public catalog route handlers.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::{CurrencyCode, ProductId};

use crate::error::Result;
use crate::models::Product;
use crate::routes::QueryParams;
use crate::services::catalog::CatalogService;
use crate::state::AppState;

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
}

/// Public view of a product. Stock level is reduced to a flag.
#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub in_stock: bool,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            in_stock: product.in_stock(),
            id: product.id,
            name: product.name,
            price: product.price,
            currency: product.currency,
        }
    }
}

/// Product listing with optional name search.
pub async fn index(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ProductQuery>,
) -> Result<Json<Vec<ProductView>>> {
    let catalog = CatalogService::new(state.store(), state.config().low_stock_threshold);
    let products = catalog.list(query.search.as_deref()).await?;

    Ok(Json(products.into_iter().map(ProductView::from).collect()))
}
