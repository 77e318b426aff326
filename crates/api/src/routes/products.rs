//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{NewProduct, ProductRecord, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    /// Decimal price such as `"19.99"`.
    pub price: String,
    pub stock: u32,
}

#[derive(Deserialize)]
pub struct UpdatePriceRequest {
    pub price: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub price: String,
    pub stock: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRecord> for ProductResponse {
    fn from(p: ProductRecord) -> Self {
        Self {
            id: p.id.get(),
            name: p.name,
            description: p.description,
            price_cents: p.price.cents(),
            price: p.price.to_string(),
            stock: p.stock,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

fn parse_price(raw: &str) -> Result<Money, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid price {raw:?}: {e}")))
}

// -- Handlers --

/// GET /products: list the catalog.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.catalog.list_products().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /products/{id}: load one product.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state.catalog.get_product(ProductId::new(id)).await?;
    Ok(Json(product.into()))
}

/// POST /products: add a product (admin).
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let mut product = NewProduct::new(req.name, parse_price(&req.price)?, req.stock);
    product.description = req.description;

    let created = state.catalog.create_product(&ctx, product).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// PATCH /products/{id}: change a product's price (admin).
#[tracing::instrument(skip(state, req))]
pub async fn update_price<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePriceRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let price = parse_price(&req.price)?;
    let updated = state
        .catalog
        .update_price(&ctx, ProductId::new(id), price)
        .await?;
    Ok(Json(updated.into()))
}

/// DELETE /products/{id}: remove a product (admin).
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete_product(&ctx, ProductId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
