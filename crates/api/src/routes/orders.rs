//! Order placement, lookup and administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, OrderStatus, PageInfo, PageRequest};
use domain::{ListOrders, OrderPage, OrderStatistics, PlaceOrder, UpdateOrderStatus, pricing};
use serde::{Deserialize, Serialize};
use store::{OrderLineRecord, OrderRecord, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Identity;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

impl ListOrdersParams {
    fn into_listing(self) -> Result<ListOrders, ApiError> {
        let page = PageRequest::new(self.page, self.limit)
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let mut listing = ListOrders::new(page);
        if let Some(status) = self.status {
            listing = listing.with_status(parse_status(&status)?);
        }
        Ok(listing)
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse()
        .map_err(|e: common::UnknownStatus| ApiError::BadRequest(e.to_string()))
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl TryFrom<OrderLineRecord> for OrderItemResponse {
    type Error = ApiError;

    fn try_from(line: OrderLineRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: line.id.get(),
            line_total_cents: pricing::line_total(line.unit_price, line.quantity)?.cents(),
            product_id: line.product_id.get(),
            product_name: line.product_name,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
        })
    }
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub total: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRecord> for OrderResponse {
    type Error = ApiError;

    fn try_from(order: OrderRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: order.id.get(),
            user_id: order.user_id.get(),
            status: order.status,
            notes: order.notes,
            total_cents: order.total.cents(),
            total: order.total.to_string(),
            items: order
                .lines
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub pagination: PageInfo,
}

impl TryFrom<OrderPage> for OrderListResponse {
    type Error = ApiError;

    fn try_from(page: OrderPage) -> Result<Self, Self::Error> {
        Ok(Self {
            orders: page
                .orders
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
            pagination: page.page,
        })
    }
}

#[derive(Serialize)]
pub struct OrderStatsResponse {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub completed_orders: u64,
    pub cancelled_orders: u64,
    pub total_revenue_cents: i64,
    pub average_order_value_cents: i64,
}

impl From<OrderStatistics> for OrderStatsResponse {
    fn from(stats: OrderStatistics) -> Self {
        Self {
            total_orders: stats.total_orders,
            pending_orders: stats.pending_orders,
            completed_orders: stats.completed_orders,
            cancelled_orders: stats.cancelled_orders,
            total_revenue_cents: stats.total_revenue.cents(),
            average_order_value_cents: stats.average_order_value.cents(),
        }
    }
}

// -- Handlers --

/// POST /orders: place an order from the caller's cart.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    req: Option<Json<CreateOrderRequest>>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let notes = req.and_then(|Json(r)| r.notes);
    let cmd = PlaceOrder { notes };

    let order = state.orders.create_order(&ctx, cmd).await?;
    Ok((StatusCode::CREATED, Json(order.try_into()?)))
}

/// GET /orders/my-orders: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_mine<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let page = state
        .orders
        .list_my_orders(&ctx, params.into_listing()?)
        .await?;
    Ok(Json(page.try_into()?))
}

/// GET /orders/my-orders/{id}: one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn get_mine<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get_order(&ctx, OrderId::new(id)).await?;
    Ok(Json(order.try_into()?))
}

/// GET /orders/admin/all: every user's orders (admin).
#[tracing::instrument(skip(state))]
pub async fn list_all<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<OrderListResponse>, ApiError> {
    ctx.require_admin().map_err(ApiError::from)?;
    let page = state
        .orders
        .list_all_orders(&ctx, params.into_listing()?)
        .await?;
    Ok(Json(page.try_into()?))
}

/// PATCH /orders/admin/{id}/status: change an order's status (admin).
#[tracing::instrument(skip(state))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    ctx.require_admin().map_err(ApiError::from)?;
    let cmd = UpdateOrderStatus {
        order_id: OrderId::new(id),
        status: parse_status(&req.status)?,
        notes: req.notes,
    };

    let order = state.orders.update_status(&ctx, cmd).await?;
    Ok(Json(order.try_into()?))
}

/// GET /orders/admin/stats: order counts and revenue (admin).
#[tracing::instrument(skip(state))]
pub async fn stats<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(ctx): Identity,
) -> Result<Json<OrderStatsResponse>, ApiError> {
    let stats = state.orders.stats(&ctx).await?;
    Ok(Json(stats.into()))
}
