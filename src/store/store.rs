//! Abstract food store trait and record types.
//!
//! Any store backend must implement [`FoodStore`].  All operations are
//! synchronous: the store never performs I/O, so callers may invoke it
//! directly from async handlers without holding anything across an
//! `.await`.

use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

// ── Record types ───────────────────────────────────────────────────

/// Nutrition facts for a food item. Opaque to the store, copied by value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Nutrition {
    /// Energy in kilocalories.
    pub calories: i64,
    /// Protein in grams.
    pub protein: f64,
    /// Carbohydrates in grams.
    pub carbohydrates: f64,
    /// Fat in grams.
    pub fat: f64,
    /// Fiber in grams.
    pub fiber: f64,
}

/// A stored food item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FoodItem {
    /// Store-assigned identifier. Never reused.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Ordered ingredient tokens.
    pub ingredients: Vec<String>,
    /// Expiration timestamp (RFC 3339 on the wire).
    #[schema(value_type = String, format = DateTime)]
    pub expiration: DateTime<FixedOffset>,
    /// Nutrition facts.
    pub nutrition: Nutrition,
}

impl FoodItem {
    /// Whether the expiration falls on the given calendar date, evaluated in
    /// the offset the record was stored with.
    pub fn expires_on(&self, year: i32, month: u32, day: u32) -> bool {
        let date = self.expiration.date_naive();
        date.year() == year && date.month() == month && date.day() == day
    }

    /// Whether any ingredient equals `token` exactly.
    pub fn has_ingredient(&self, token: &str) -> bool {
        self.ingredients.iter().any(|ing| ing == token)
    }
}

/// Everything needed to create a food item; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodItem {
    pub name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub expiration: DateTime<FixedOffset>,
    pub nutrition: Nutrition,
}

impl NewFoodItem {
    pub(crate) fn into_record(self, id: u64) -> FoodItem {
        FoodItem {
            id,
            name: self.name,
            description: self.description,
            ingredients: self.ingredients,
            expiration: self.expiration,
            nutrition: self.nutrition,
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// Outcome of a store operation that did not apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No record with the requested id exists.
    #[error("food with id={id} not found")]
    NotFound { id: u64 },

    /// The id counter cannot advance any further.
    #[error("food id space exhausted")]
    IdsExhausted,
}

// ── FoodStore trait ────────────────────────────────────────────────

/// Storage interface for food records.
///
/// Every method is atomic with respect to every other: a caller never
/// observes a record mid-creation, and query results are a consistent
/// snapshot of the store at a single instant.
pub trait FoodStore: Send + Sync {
    /// Store a new item and return its freshly assigned id.
    fn create(&self, item: NewFoodItem) -> Result<u64, StoreError>;

    /// Fetch a single item by id.
    fn get(&self, id: u64) -> Result<FoodItem, StoreError>;

    /// Remove a single item. Fails with `NotFound` without mutating state
    /// if the id is absent.
    fn delete(&self, id: u64) -> Result<(), StoreError>;

    /// Remove every item. The id counter is not reset.
    fn delete_all(&self) -> Result<(), StoreError>;

    /// Every item currently stored, in unspecified order.
    fn list_all(&self) -> Vec<FoodItem>;

    /// Items whose ingredient list contains `token` exactly (case-sensitive).
    fn find_by_ingredient(&self, token: &str) -> Vec<FoodItem>;

    /// Items expiring on the given calendar date.
    fn find_by_expiration_date(&self, year: i32, month: u32, day: u32) -> Vec<FoodItem>;

    /// Number of items currently stored.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
