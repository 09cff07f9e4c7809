//! Food item API handlers.

use std::sync::Arc;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::errors::ApiError;
use crate::metrics;
use crate::store::store::{FoodItem, NewFoodItem, Nutrition};
use crate::AppState;

// -- Request / response bodies ------------------------------------------------

/// Body of `POST /food/`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateFoodRequest {
    pub name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    /// RFC 3339 timestamp, e.g. `2023-07-01T00:00:00Z`.
    #[schema(value_type = String, format = DateTime)]
    pub expiration: DateTime<FixedOffset>,
    pub nutrition: Nutrition,
}

impl From<CreateFoodRequest> for NewFoodItem {
    fn from(req: CreateFoodRequest) -> Self {
        NewFoodItem {
            name: req.name,
            description: req.description,
            ingredients: req.ingredients,
            expiration: req.expiration,
            nutrition: req.nutrition,
        }
    }
}

/// Response of `POST /food/`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatedFood {
    pub id: u64,
}

// -- Content-Type enforcement -------------------------------------------------

/// Require a JSON `Content-Type`.
///
/// A missing or unparsable header is a bad request; a well-formed header
/// naming another media type is unsupported.
pub fn require_json(headers: &HeaderMap) -> Result<(), ApiError> {
    let raw = headers
        .get(header::CONTENT_TYPE)
        .ok_or_else(|| ApiError::bad_request("mime: no media type"))?
        .to_str()
        .map_err(|_| ApiError::bad_request("mime: invalid media type"))?;

    let media_type = raw.split(';').next().unwrap_or_default().trim();
    let well_formed = media_type
        .split_once('/')
        .is_some_and(|(ty, sub)| !ty.is_empty() && !sub.is_empty() && !sub.contains('/'))
        && !media_type.contains(char::is_whitespace);
    if !well_formed {
        return Err(ApiError::bad_request("mime: expected slash after first token"));
    }

    if !media_type.eq_ignore_ascii_case("application/json") {
        return Err(ApiError::UnsupportedMediaType);
    }
    Ok(())
}

fn json_ok<T: Serialize>(value: &T) -> Result<Response, ApiError> {
    let body = serde_json::to_vec(value).map_err(|e| ApiError::InternalError(e.into()))?;
    Ok((
        StatusCode::OK,
        [("content-type", "application/json")],
        body,
    )
        .into_response())
}

fn list_ok(operation: &'static str, food: Vec<FoodItem>) -> Result<Response, ApiError> {
    metrics::record_store_op(operation, true);
    debug!(operation, count = food.len(), "query complete");
    json_ok(&food)
}

// -- Handlers -----------------------------------------------------------------

/// `POST /food/` -- Create a food item.
#[utoipa::path(
    post,
    path = "/food/",
    tag = "Food",
    operation_id = "CreateFood",
    request_body = CreateFoodRequest,
    responses(
        (status = 200, description = "Food created", body = CreatedFood),
        (status = 400, description = "Malformed body or Content-Type"),
        (status = 401, description = "Missing or invalid credentials"),
        (status = 415, description = "Content-Type is not application/json")
    ),
    security(("basic_auth" = []))
)]
pub async fn create_food(
    state: Arc<AppState>,
    user: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    require_json(headers)?;

    let req: CreateFoodRequest =
        serde_json::from_slice(body).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let result = state.store.create(req.into());
    metrics::record_store_op("create", result.is_ok());
    let id = result?;
    metrics::set_food_items(state.store.len());

    info!(id, user, "created food item");
    json_ok(&CreatedFood { id })
}

/// `GET /food/` -- List every food item.
#[utoipa::path(
    get,
    path = "/food/",
    tag = "Food",
    operation_id = "ListFood",
    responses((status = 200, description = "All food items", body = [FoodItem]))
)]
pub async fn list_food(state: Arc<AppState>) -> Result<Response, ApiError> {
    let food = state.store.list_all();
    list_ok("list_all", food)
}

/// `DELETE /food/` -- Delete every food item.
#[utoipa::path(
    delete,
    path = "/food/",
    tag = "Food",
    operation_id = "DeleteAllFood",
    responses((status = 200, description = "All food deleted"))
)]
pub async fn delete_all_food(state: Arc<AppState>) -> Result<Response, ApiError> {
    let result = state.store.delete_all();
    metrics::record_store_op("delete_all", result.is_ok());
    result?;
    metrics::set_food_items(state.store.len());

    info!("deleted all food items");
    Ok(StatusCode::OK.into_response())
}

/// `GET /food/{id}` -- Fetch one food item.
#[utoipa::path(
    get,
    path = "/food/{id}",
    tag = "Food",
    operation_id = "GetFood",
    params(("id" = u64, Path, description = "Food id")),
    responses(
        (status = 200, description = "The food item", body = FoodItem),
        (status = 400, description = "Id is not a non-negative integer"),
        (status = 404, description = "No such food")
    )
)]
pub async fn get_food(state: Arc<AppState>, id: u64) -> Result<Response, ApiError> {
    let result = state.store.get(id);
    metrics::record_store_op("get", result.is_ok());
    json_ok(&result?)
}

/// `DELETE /food/{id}` -- Delete one food item.
#[utoipa::path(
    delete,
    path = "/food/{id}",
    tag = "Food",
    operation_id = "DeleteFood",
    params(("id" = u64, Path, description = "Food id")),
    responses(
        (status = 200, description = "Food deleted"),
        (status = 400, description = "Id is not a non-negative integer"),
        (status = 404, description = "No such food")
    )
)]
pub async fn delete_food(state: Arc<AppState>, id: u64) -> Result<Response, ApiError> {
    let result = state.store.delete(id);
    metrics::record_store_op("delete", result.is_ok());
    result?;
    metrics::set_food_items(state.store.len());

    info!(id, "deleted food item");
    Ok(StatusCode::OK.into_response())
}

/// `GET /ing/{ingredient}` -- Food items containing an ingredient.
#[utoipa::path(
    get,
    path = "/ing/{ingredient}",
    tag = "Query",
    operation_id = "FindByIngredient",
    params(("ingredient" = String, Path, description = "Exact, case-sensitive ingredient")),
    responses((status = 200, description = "Matching food items", body = [FoodItem]))
)]
pub async fn food_by_ingredient(state: Arc<AppState>, ingredient: &str) -> Result<Response, ApiError> {
    let food = state.store.find_by_ingredient(ingredient);
    list_ok("find_by_ingredient", food)
}

/// `GET /exp/{year}/{month}/{day}` -- Food items expiring on a date.
#[utoipa::path(
    get,
    path = "/exp/{year}/{month}/{day}",
    tag = "Query",
    operation_id = "FindByExpiration",
    params(
        ("year" = i32, Path, description = "Year"),
        ("month" = u32, Path, description = "Month, 1-12"),
        ("day" = u32, Path, description = "Day of month")
    ),
    responses(
        (status = 200, description = "Matching food items", body = [FoodItem]),
        (status = 400, description = "Malformed date")
    )
)]
pub async fn food_by_expiration(
    state: Arc<AppState>,
    year: i32,
    month: u32,
    day: u32,
) -> Result<Response, ApiError> {
    let food = state.store.find_by_expiration_date(year, month, day);
    list_ok("find_by_expiration_date", food)
}
