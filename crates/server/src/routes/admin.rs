//! Admin inventory route handlers.
//!
//! All handlers require an admin caller via [`RequireAdmin`].

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bazaar_core::{CurrencyCode, ProductId};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Product;
use crate::routes::{JsonBody, PathParam};
use crate::services::catalog::{CatalogService, ProductDraft};
use crate::state::AppState;

/// Product fields sent by an admin. Older clients send `product_name`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductForm {
    #[serde(alias = "product_name")]
    pub name: Option<String>,
    pub amount: Option<i32>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
}

impl From<ProductForm> for ProductDraft {
    fn from(form: ProductForm) -> Self {
        Self {
            name: form.name,
            amount: form.amount,
            price: form.price,
            currency: form.currency,
        }
    }
}

/// Full inventory view of a product.
#[derive(Debug, Serialize)]
pub struct InventoryView {
    pub id: ProductId,
    pub name: String,
    pub amount: i32,
    pub price: Decimal,
    pub currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for InventoryView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            amount: product.amount,
            price: product.price,
            currency: product.currency,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// A product at or below the low-stock threshold.
#[derive(Debug, Serialize)]
pub struct LowStockView {
    pub id: ProductId,
    pub name: String,
    pub amount: i32,
}

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.store(), state.config().low_stock_threshold)
}

/// List all products with stock levels.
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<InventoryView>>> {
    let products = catalog(&state).list(None).await?;
    Ok(Json(products.into_iter().map(InventoryView::from).collect()))
}

/// Create a product.
#[instrument(skip(state, admin, form), fields(admin = %admin.username.as_str()))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    JsonBody(form): JsonBody<ProductForm>,
) -> Result<Json<InventoryView>> {
    let product = catalog(&state).create(form.into()).await?;
    Ok(Json(product.into()))
}

/// Partially update a product.
#[instrument(skip(state, admin, form), fields(admin = %admin.username.as_str()))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<ProductId>,
    JsonBody(form): JsonBody<ProductForm>,
) -> Result<Json<InventoryView>> {
    let product = catalog(&state).update(id, form.into()).await?;
    Ok(Json(product.into()))
}

/// Delete a product. Responds with an empty body.
#[instrument(skip(state, admin), fields(admin = %admin.username.as_str()))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    PathParam(id): PathParam<ProductId>,
) -> Result<StatusCode> {
    catalog(&state).delete(id).await?;
    Ok(StatusCode::OK)
}

/// Products at or below the low-stock threshold.
pub async fn low_stock(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<LowStockView>>> {
    let products = catalog(&state).low_stock().await?;
    Ok(Json(
        products
            .into_iter()
            .map(|p| LowStockView {
                id: p.id,
                name: p.name,
                amount: p.amount,
            })
            .collect(),
    ))
}
