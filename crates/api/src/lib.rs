//! HTTP API server for the commerce backend.
//!
//! Provides REST endpoints for the catalog, carts and orders, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::{CartService, CatalogService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub store: S,
}

impl<S: Store + Clone> AppState<S> {
    /// Builds every service over one store.
    pub fn new(store: S) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            store,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .patch(routes::products::update_price::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/cart",
            get(routes::cart::get::<S>)
                .post(routes::cart::add::<S>)
                .delete(routes::cart::clear::<S>),
        )
        .route(
            "/cart/{id}",
            get(routes::cart::get_line::<S>)
                .patch(routes::cart::update_line::<S>)
                .delete(routes::cart::remove_line::<S>),
        )
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/my-orders", get(routes::orders::list_mine::<S>))
        .route("/orders/my-orders/{id}", get(routes::orders::get_mine::<S>))
        .route("/orders/admin/all", get(routes::orders::list_all::<S>))
        .route(
            "/orders/admin/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route("/orders/admin/stats", get(routes::orders::stats::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
