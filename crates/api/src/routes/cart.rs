//! Cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CartLineId, ProductId};
use domain::{AddToCart, Cart, UpdateCartLine, pricing};
use serde::{Deserialize, Serialize};
use store::{CartLineRecord, Store};

use super::products::ProductResponse;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartLineRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartLineResponse {
    pub id: i64,
    pub quantity: u32,
    pub line_total_cents: i64,
    pub product: ProductResponse,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CartLineRecord> for CartLineResponse {
    type Error = ApiError;

    fn try_from(line: CartLineRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: line.id.get(),
            quantity: line.quantity,
            line_total_cents: pricing::line_total(line.product.price, line.quantity)?.cents(),
            product: line.product.into(),
            created_at: line.created_at,
            updated_at: line.updated_at,
        })
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub item_count: u64,
    pub total_cents: i64,
    pub total: String,
}

impl TryFrom<Cart> for CartResponse {
    type Error = ApiError;

    fn try_from(cart: Cart) -> Result<Self, Self::Error> {
        Ok(Self {
            item_count: cart.item_count,
            total_cents: cart.total.cents(),
            total: cart.total.to_string(),
            items: cart
                .lines
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Serialize)]
pub struct ClearCartResponse {
    pub removed: u64,
}

// -- Handlers --

/// POST /cart: add units of a product to the cart.
#[tracing::instrument(skip(state))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLineResponse>), ApiError> {
    let line = state
        .carts
        .add_item(
            &ctx,
            AddToCart::new(ProductId::new(req.product_id), req.quantity),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(line.try_into()?)))
}

/// GET /cart: the caller's cart with totals.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_cart(&ctx).await?;
    Ok(Json(cart.try_into()?))
}

/// DELETE /cart: remove every line.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
) -> Result<Json<ClearCartResponse>, ApiError> {
    let removed = state.carts.clear(&ctx).await?;
    Ok(Json(ClearCartResponse { removed }))
}

/// GET /cart/{id}: one cart line.
#[tracing::instrument(skip(state))]
pub async fn get_line<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Path(id): Path<i64>,
) -> Result<Json<CartLineResponse>, ApiError> {
    let line = state.carts.get_line(&ctx, CartLineId::new(id)).await?;
    Ok(Json(line.try_into()?))
}

/// PATCH /cart/{id}: set a line's quantity.
#[tracing::instrument(skip(state))]
pub async fn update_line<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCartLineRequest>,
) -> Result<Json<CartLineResponse>, ApiError> {
    let line = state
        .carts
        .update_line(&ctx, UpdateCartLine::new(CartLineId::new(id), req.quantity))
        .await?;
    Ok(Json(line.try_into()?))
}

/// DELETE /cart/{id}: remove a line.
#[tracing::instrument(skip(state))]
pub async fn remove_line<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.carts.remove_line(&ctx, CartLineId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
