//! Prometheus metrics for GroceryStore.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a middleware for HTTP RED
//! metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "grocerystore_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "grocerystore_http_request_duration_seconds";

/// Total store operations (counter). Labels: operation, status.
pub const STORE_OPERATIONS_TOTAL: &str = "grocerystore_store_operations_total";

/// Food items currently stored (gauge).
pub const FOOD_ITEMS_TOTAL: &str = "grocerystore_food_items_total";

// -- Global recorder installation ---------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(STORE_OPERATIONS_TOTAL, "Total store operations by type");
    describe_gauge!(FOOD_ITEMS_TOTAL, "Food items currently stored");
}

/// Count one store operation.
pub fn record_store_op(operation: &'static str, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    counter!(STORE_OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
}

/// Publish the current number of stored items.
pub fn set_food_items(count: usize) {
    gauge!(FOOD_ITEMS_TOTAL).set(count as f64);
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation. Must be the outermost
/// layer so it captures the full request lifecycle.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Normalize an actual request path to a route template for metric labels,
/// keeping ids, ingredients and dates out of label values.
///
/// Examples:
/// - `/food/` -> `/food/`
/// - `/food/42` -> `/food/{id}`
/// - `/ing/Apples/` -> `/ing/{ingredient}`
/// - `/exp/2023/7/1` -> `/exp/{year}/{month}/{day}`
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut segments = trimmed.split('/');
    match (segments.next(), segments.next()) {
        (Some("food"), None) => "/food/".to_string(),
        (Some("food"), Some(_)) => "/food/{id}".to_string(),
        (Some("ing"), Some(_)) => "/ing/{ingredient}".to_string(),
        (Some("exp"), Some(_)) => "/exp/{year}/{month}/{day}".to_string(),
        (Some(""), None) => "/".to_string(),
        (Some("health" | "metrics" | "openapi.json"), None) => format!("/{trimmed}"),
        _ => "/{other}".to_string(),
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

// -- Tests --------------------------------------------------------------------
