//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics::Unit;
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the counters and histograms the services emit.
///
/// Call once after the recorder is installed.
pub fn describe() {
    metrics::describe_counter!("orders_created_total", "Orders placed from a cart");
    metrics::describe_counter!("orders_cancelled_total", "Orders moved into CANCELLED");
    metrics::describe_counter!(
        "order_status_updates_total",
        "Applied status changes, labelled by target status"
    );
    metrics::describe_counter!(
        "stock_reservations_rejected_total",
        "Reservations refused because stock was short"
    );
    metrics::describe_counter!(
        "stock_released_units_total",
        Unit::Count,
        "Units returned to stock by cancellations"
    );
    metrics::describe_counter!("cart_additions_total", "Successful add-to-cart calls");
    metrics::describe_histogram!(
        "order_creation_duration_seconds",
        Unit::Seconds,
        "Time spent placing an order, including commit"
    );
    metrics::describe_counter!("api_errors_total", "Error responses, labelled by error code");
}

/// GET /metrics: Prometheus text exposition.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
