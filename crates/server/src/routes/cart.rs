//! Cart route handlers.
//!
//! Every handler is scoped to the authenticated caller's cart.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use bazaar_core::{CartItemId, ProductId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::routes::{JsonBody, PathParam};
use crate::services::cart::{CartService, CartSummary, SummaryLine};
use crate::state::AppState;

/// Add-to-cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i32>,
}

/// One priced cart line.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price_per_item: Decimal,
    pub total: Decimal,
}

/// The caller's cart with totals.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total: Decimal,
}

impl From<SummaryLine> for CartLineView {
    fn from(line: SummaryLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name,
            quantity: line.quantity,
            price_per_item: line.price_per_item,
            total: line.total,
        }
    }
}

impl From<CartSummary> for CartView {
    fn from(summary: CartSummary) -> Self {
        Self {
            items: summary.items.into_iter().map(CartLineView::from).collect(),
            total: summary.total,
        }
    }
}

/// Add a product to the cart.
#[instrument(skip(state, form))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    JsonBody(form): JsonBody<AddToCartForm>,
) -> Result<Json<Value>> {
    let (Some(product_id), Some(quantity)) = (form.product_id, form.quantity) else {
        return Err(AppError::Validation("Missing required fields".to_string()));
    };

    let item = CartService::new(state.store())
        .add(user_id, product_id, quantity)
        .await?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", product_id.to_string().as_str())]),
    );
    tracing::info!(item_id = %item.id, "Cart line added");

    Ok(Json(json!({ "message": "Product added successfully" })))
}

/// Remove one of the caller's cart lines.
#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
    PathParam(item_id): PathParam<CartItemId>,
) -> Result<Json<Value>> {
    CartService::new(state.store())
        .remove(user_id, item_id)
        .await?;

    add_breadcrumb(
        "cart",
        "Removed from cart",
        Some(&[("item_id", item_id.to_string().as_str())]),
    );

    Ok(Json(json!({ "message": "Product removed successfully" })))
}

/// Priced summary of the caller's cart.
#[instrument(skip(state))]
pub async fn summary(
    State(state): State<AppState>,
    RequireAuth(user_id): RequireAuth,
) -> Result<Json<CartView>> {
    let summary = CartService::new(state.store()).summary(user_id).await?;
    Ok(Json(summary.into()))
}
