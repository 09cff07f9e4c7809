//! Axum router construction and route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and returns a
//! ready-to-serve [`axum::Router`].  Each route has a thin dispatch
//! function here that extracts and validates path segments, headers and
//! body, then calls into [`crate::handlers::food`].

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::PathRejection, Path, State},
    handler::Handler,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Extension, Json, Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, info, warn};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::AuthenticatedUser;
use crate::errors::{generate_request_id, ApiError};
use crate::handlers::food;
use crate::metrics::{self, metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the GroceryStore API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "GroceryStore API",
        version = "0.1.0",
        description = "In-memory grocery item tracking service"
    ),
    paths(
        health_check,
        food::create_food,
        food::list_food,
        food::delete_all_food,
        food::get_food,
        food::delete_food,
        food::food_by_ingredient,
        food::food_by_expiration,
    ),
    components(schemas(
        crate::store::store::FoodItem,
        crate::store::store::Nutrition,
        food::CreateFoodRequest,
        food::CreatedFood,
    )),
    modifiers(&BasicAuthScheme),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Food", description = "Food item operations"),
        (name = "Query", description = "Secondary lookups"),
    )
)]
pub struct ApiDoc;

struct BasicAuthScheme;

impl Modify for BasicAuthScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            );
        }
    }
}

/// Build the axum [`Router`] with all routes.
///
/// Every path is also reachable with a trailing slash.
pub fn app(state: Arc<AppState>) -> Router {
    let food_root: MethodRouter<Arc<AppState>> = get(handle_list_food)
        .delete(handle_delete_all_food)
        .post(handle_create_food.layer(middleware::from_fn_with_state(
            state.clone(),
            basic_auth_middleware,
        )))
        .fallback(method_not_allowed);
    let food_item = get(handle_get_food)
        .delete(handle_delete_food)
        .fallback(method_not_allowed);
    let by_ingredient = get(handle_food_by_ingredient).fallback(method_not_allowed);
    let by_expiration = get(handle_food_by_expiration).fallback(method_not_allowed);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_json))
        .route("/food", food_root.clone())
        .route("/food/", food_root)
        .route("/food/:id", food_item.clone())
        .route("/food/:id/", food_item)
        .route("/ing/:ingredient", by_ingredient.clone())
        .route("/ing/:ingredient/", by_ingredient)
        .route("/exp/:year/:month/:day", by_expiration.clone())
        .route("/exp/:year/:month/:day/", by_expiration);

    if state.config.observability.metrics {
        router = router.route("/metrics", get(handle_metrics));
    }

    router
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        // Panic containment is innermost so the layers above see a 500.
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(middleware::from_fn(request_log_middleware))
        // metrics_middleware is outermost (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Panic containment -------------------------------------------------------

/// Convert a handler panic into a generic 500 response. The panic payload
/// and a captured backtrace are logged with the internal error.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    let backtrace = std::backtrace::Backtrace::force_capture();
    ApiError::InternalError(anyhow::anyhow!("handler panicked: {detail}\n{backtrace}"))
        .into_response()
}

// -- Request logging ---------------------------------------------------------

/// Log method, path, status and duration of every request.
async fn request_log_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %uri,
        status = response.status().as_u16(),
        elapsed = ?start.elapsed(),
        "request"
    );
    response
}

// -- Common headers middleware -----------------------------------------------

/// Adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `GroceryStore`
async fn common_headers_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    // Error responses carry their own request id.
    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert(header::DATE, value);
    }
    headers.insert(header::SERVER, HeaderValue::from_static("GroceryStore"));

    response
}

// -- Auth middleware ---------------------------------------------------------

/// HTTP Basic authentication gate.
///
/// Applied only to `POST /food/`. On success the username is attached to
/// the request as [`AuthenticatedUser`]; otherwise responds 401 with a
/// `WWW-Authenticate` challenge.
async fn basic_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| state.credentials.verify_header(h));

    match user {
        Some(user) => {
            debug!("Auth OK for user {}", user);
            req.extensions_mut().insert(AuthenticatedUser(user));
            Ok(next.run(req).await)
        }
        None => {
            warn!("Rejected unauthenticated {} {}", req.method(), req.uri().path());
            Err(ApiError::Unauthorized {
                realm: state.config.auth.realm.clone(),
            })
        }
    }
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// `GET /openapi.json` -- The OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// `GET /metrics` -- Prometheus exposition. The item gauge is refreshed
/// from the store first so a scrape never reports a stale count.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Response {
    metrics::set_food_items(state.store.len());
    metrics_handler().await
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed {
        method: method.to_string(),
    }
}

// -- Path parameter parsing --------------------------------------------------

/// Unwrap a path extraction, turning axum's plain-text rejection (e.g. a
/// segment that is not valid UTF-8 once decoded) into a JSON bad request.
fn path_param<T>(path: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    path.map(|Path(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// Parse a path segment made only of ASCII digits.
fn parse_digits<T: std::str::FromStr>(segment: &str) -> Option<T> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Parse a `/food/{id}` segment. Anything but a non-negative integer is a
/// bad request, never a not-found.
fn parse_id(segment: &str) -> Result<u64, ApiError> {
    parse_digits(segment)
        .ok_or_else(|| ApiError::bad_request(format!("invalid food id {segment:?}")))
}

/// Calendar date taken from `/exp/{year}/{month}/{day}`.
#[derive(Debug, PartialEq, Eq, garde::Validate)]
pub struct ExpirationDate {
    #[garde(skip)]
    pub year: i32,
    #[garde(range(min = 1, max = 12))]
    pub month: u32,
    #[garde(skip)]
    pub day: u32,
}

impl ExpirationDate {
    /// Parse and validate the three path segments. `path` is only used in
    /// the error message.
    pub fn parse(year: &str, month: &str, day: &str, path: &str) -> Result<Self, ApiError> {
        let bad = || ApiError::bad_request(format!("expect /exp/<year>/<month>/<day>, got {path}"));

        let date = ExpirationDate {
            year: parse_digits(year).ok_or_else(bad)?,
            month: parse_digits(month).ok_or_else(bad)?,
            day: parse_digits(day).ok_or_else(bad)?,
        };
        garde::Validate::validate(&date).map_err(|_| bad())?;
        Ok(date)
    }
}

// -- Route dispatch ----------------------------------------------------------

/// `POST /food/` -- CreateFood (behind the Basic auth gate)
async fn handle_create_food(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    food::create_food(state, &user, &headers, &body).await
}

/// `GET /food/` -- ListFood
async fn handle_list_food(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    food::list_food(state).await
}

/// `DELETE /food/` -- DeleteAllFood
async fn handle_delete_all_food(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    food::delete_all_food(state).await
}

/// `GET /food/{id}` -- GetFood
async fn handle_get_food(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&path_param(id)?)?;
    food::get_food(state, id).await
}

/// `DELETE /food/{id}` -- DeleteFood
async fn handle_delete_food(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&path_param(id)?)?;
    food::delete_food(state, id).await
}

/// `GET /ing/{ingredient}` -- FindByIngredient
async fn handle_food_by_ingredient(
    State(state): State<Arc<AppState>>,
    ingredient: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let ingredient = path_param(ingredient)?;
    food::food_by_ingredient(state, &ingredient).await
}

/// `GET /exp/{year}/{month}/{day}` -- FindByExpiration
async fn handle_food_by_expiration(
    State(state): State<Arc<AppState>>,
    segments: Result<Path<(String, String, String)>, PathRejection>,
    uri: Uri,
) -> Result<Response, ApiError> {
    let (year, month, day) = path_param(segments)?;
    let date = ExpirationDate::parse(&year, &month, &day, uri.path())?;
    food::food_by_expiration(state, date.year, date.month, date.day).await
}

// -- Tests --------------------------------------------------------------------
