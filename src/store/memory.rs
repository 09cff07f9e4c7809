//! In-memory food store.
//!
//! Stores all records in memory with no persistence. Uses a single
//! `RwLock` around the record map and the id counter, so every operation
//! observes and mutates both atomically.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::store::{FoodItem, FoodStore, NewFoodItem, StoreError};

#[derive(Debug, Default)]
struct Inner {
    food: HashMap<u64, FoodItem>,
    next_id: u64,
}

#[derive(Debug, Default)]
pub struct MemoryFoodStore {
    inner: RwLock<Inner>,
}

impl MemoryFoodStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_next_id(next_id: u64) -> Self {
        Self {
            inner: RwLock::new(Inner {
                food: HashMap::new(),
                next_id,
            }),
        }
    }

    // No operation panics while holding the write guard, so the data behind
    // a poisoned lock is still whole.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn select(&self, pred: impl Fn(&FoodItem) -> bool) -> Vec<FoodItem> {
        let inner = self.read();
        inner.food.values().filter(|f| pred(f)).cloned().collect()
    }
}

impl FoodStore for MemoryFoodStore {
    fn create(&self, item: NewFoodItem) -> Result<u64, StoreError> {
        let mut inner = self.write();
        let id = inner.next_id;
        inner.next_id = id.checked_add(1).ok_or(StoreError::IdsExhausted)?;
        inner.food.insert(id, item.into_record(id));
        Ok(id)
    }

    fn get(&self, id: u64) -> Result<FoodItem, StoreError> {
        let inner = self.read();
        inner.food.get(&id).cloned().ok_or(StoreError::NotFound { id })
    }

    fn delete(&self, id: u64) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner
            .food
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound { id })
    }

    fn delete_all(&self) -> Result<(), StoreError> {
        let mut inner = self.write();
        inner.food = HashMap::new();
        Ok(())
    }

    fn list_all(&self) -> Vec<FoodItem> {
        self.select(|_| true)
    }

    fn find_by_ingredient(&self, token: &str) -> Vec<FoodItem> {
        self.select(|f| f.has_ingredient(token))
    }

    fn find_by_expiration_date(&self, year: i32, month: u32, day: u32) -> Vec<FoodItem> {
        self.select(|f| f.expires_on(year, month, day))
    }

    fn len(&self) -> usize {
        self.read().food.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::store::Nutrition;
    use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn test_store() -> MemoryFoodStore {
        MemoryFoodStore::new()
    }

    fn date(y: i32, m: u32, d: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, m, d, 0, 0, 0)
            .unwrap()
    }

    fn make_food(name: &str, ingredients: &[&str], expiration: DateTime<FixedOffset>) -> NewFoodItem {
        NewFoodItem {
            name: name.to_string(),
            description: "From Costco".to_string(),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            expiration,
            nutrition: Nutrition::default(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = test_store();
        let nutrition = Nutrition {
            calories: 52,
            protein: 0.3,
            carbohydrates: 14.0,
            fat: 0.2,
            fiber: 2.4,
        };
        let mut item = make_food("Strawberries", &["strawberry", "sugar"], date(2023, 7, 1));
        item.nutrition = nutrition;
        let id = store.create(item).unwrap();

        let food = store.get(id).unwrap();
        assert_eq!(food.id, id);
        assert_eq!(food.name, "Strawberries");
        assert_eq!(food.description, "From Costco");
        assert_eq!(food.ingredients, vec!["strawberry", "sugar"]);
        assert_eq!(food.expiration, date(2023, 7, 1));
        assert_eq!(food.nutrition, nutrition);

        let all = store.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);

        assert_eq!(store.get(id + 1), Err(StoreError::NotFound { id: id + 1 }));

        store
            .create(make_food("Bananas", &[], date(2023, 7, 1)))
            .unwrap();
        assert_eq!(store.list_all().len(), 2);
    }

    #[test]
    fn test_first_id_is_zero_and_ids_increase() {
        let store = test_store();
        let a = store.create(make_food("a", &[], date(2023, 7, 1))).unwrap();
        let b = store.create(make_food("b", &[], date(2023, 7, 1))).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn test_delete() {
        let store = test_store();
        let id1 = store.create(make_food("Apples", &[], date(2023, 7, 1))).unwrap();
        let id2 = store.create(make_food("Kiwis", &[], date(2023, 7, 1))).unwrap();

        assert_eq!(
            store.delete(id1 + 1001),
            Err(StoreError::NotFound { id: id1 + 1001 })
        );
        assert_eq!(store.len(), 2);

        store.delete(id1).unwrap();
        assert_eq!(store.get(id1), Err(StoreError::NotFound { id: id1 }));
        assert_eq!(store.list_all().len(), 1);

        // Deleting again fails the same way and changes nothing.
        assert_eq!(store.delete(id1), Err(StoreError::NotFound { id: id1 }));
        assert_eq!(store.delete(id1), Err(StoreError::NotFound { id: id1 }));
        assert_eq!(store.len(), 1);

        store.delete(id2).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_all() {
        let store = test_store();
        store.create(make_food("Apples", &[], date(2023, 7, 1))).unwrap();
        store.create(make_food("Kiwis", &[], date(2023, 7, 1))).unwrap();

        store.delete_all().unwrap();
        assert!(store.list_all().is_empty());

        // Deleting everything from an empty store is fine too.
        store.delete_all().unwrap();
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn test_ids_never_reused() {
        let store = test_store();
        let first = store.create(make_food("a", &[], date(2023, 7, 1))).unwrap();
        let second = store.create(make_food("b", &[], date(2023, 7, 1))).unwrap();
        store.delete(second).unwrap();

        let third = store.create(make_food("c", &[], date(2023, 7, 1))).unwrap();
        assert!(third > second);

        store.delete_all().unwrap();
        let fourth = store.create(make_food("d", &[], date(2023, 7, 1))).unwrap();
        assert!(fourth > third);
        assert_ne!(fourth, first);
    }

    #[test]
    fn test_find_by_ingredient() {
        let store = test_store();
        store.create(make_food("Apples", &["Apples"], date(2023, 7, 1))).unwrap();
        store.create(make_food("Kiwis", &["Kiwis"], date(2023, 7, 1))).unwrap();
        for name in ["a", "b", "c", "d"] {
            store.create(make_food(name, &[], date(2023, 7, 1))).unwrap();
        }

        let found = store.find_by_ingredient("Apples");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Apples");

        assert!(store.find_by_ingredient("Strawberries").is_empty());
    }

    #[test]
    fn test_find_by_ingredient_exact_token() {
        let store = test_store();
        store
            .create(make_food("pie", &["apple", "apple", "flour"], date(2023, 7, 1)))
            .unwrap();
        store
            .create(make_food("juice", &["Apple juice"], date(2023, 7, 1)))
            .unwrap();

        // Listed twice, still one match.
        assert_eq!(store.find_by_ingredient("apple").len(), 1);
        // Case-sensitive, no substring matching.
        assert!(store.find_by_ingredient("Apple").is_empty());
        assert!(store.find_by_ingredient("app").is_empty());
    }

    #[test]
    fn test_find_by_expiration_date() {
        let store = test_store();
        for (y, m, d) in [
            (2020, 12, 1),
            (2000, 12, 21),
            (2020, 12, 1),
            (2000, 12, 21),
            (2000, 12, 21),
            (1991, 1, 1),
        ] {
            store.create(make_food("x", &[], date(y, m, d))).unwrap();
        }

        assert_eq!(store.find_by_expiration_date(2000, 12, 21).len(), 3);
        assert!(store.find_by_expiration_date(2020, 1, 1).is_empty());
        assert_eq!(store.find_by_expiration_date(1991, 1, 1).len(), 1);
        assert!(store.find_by_expiration_date(2000, 12, 45).is_empty());
    }

    #[test]
    fn test_find_by_expiration_date_uses_stored_offset() {
        let store = test_store();
        // 23:30 on the 21st at UTC-5 is already the 22nd in UTC.
        let late = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2000, 12, 21)
                    .unwrap()
                    .and_hms_opt(23, 30, 0)
                    .unwrap(),
            )
            .unwrap();
        store.create(make_food("late", &[], late)).unwrap();

        assert_eq!(store.find_by_expiration_date(2000, 12, 21).len(), 1);
        assert!(store.find_by_expiration_date(2000, 12, 22).is_empty());
    }

    #[test]
    fn test_caller_vector_is_not_shared() {
        let store = test_store();
        let mut ingredients = vec!["salt".to_string()];
        let item = NewFoodItem {
            name: "chips".to_string(),
            description: String::new(),
            ingredients: ingredients.clone(),
            expiration: date(2023, 7, 1),
            nutrition: Nutrition::default(),
        };
        let id = store.create(item).unwrap();
        ingredients.push("vinegar".to_string());
        ingredients[0] = "pepper".to_string();

        assert_eq!(store.get(id).unwrap().ingredients, vec!["salt"]);
    }

    #[test]
    fn test_id_exhaustion_fails_closed() {
        let store = MemoryFoodStore::with_next_id(u64::MAX - 1);
        let last = store.create(make_food("last", &[], date(2023, 7, 1))).unwrap();
        assert_eq!(last, u64::MAX - 1);

        assert_eq!(
            store.create(make_food("overflow", &[], date(2023, 7, 1))),
            Err(StoreError::IdsExhausted)
        );
        assert_eq!(store.len(), 1);
        // Still exhausted; nothing wrapped back to zero.
        assert_eq!(
            store.create(make_food("again", &[], date(2023, 7, 1))),
            Err(StoreError::IdsExhausted)
        );
        assert_eq!(store.get(0), Err(StoreError::NotFound { id: 0 }));
    }

    #[test]
    fn test_concurrent_create() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let store = Arc::new(test_store());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|i| {
                            let name = format!("item-{t}-{i}");
                            let item = NewFoodItem {
                                name: name.clone(),
                                description: name.clone(),
                                ingredients: vec![name],
                                expiration: date(2023, 7, 1),
                                nutrition: Nutrition::default(),
                            };
                            store.create(item).unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(ids.len(), THREADS * PER_THREAD);

        let all = store.list_all();
        assert_eq!(all.len(), THREADS * PER_THREAD);
        for food in &all {
            assert!(ids.contains(&food.id));
            // Every field was written by the same create call.
            assert_eq!(food.name, food.description);
            assert_eq!(food.ingredients, vec![food.name.clone()]);
        }
    }

    #[tokio::test]
    async fn test_concurrent_create_and_list() {
        let store: Arc<dyn FoodStore> = Arc::new(test_store());
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..64 {
            let store = Arc::clone(&store);
            tasks.spawn(async move {
                let snapshot = store.list_all();
                for food in &snapshot {
                    assert_eq!(food.ingredients, vec![food.name.clone()]);
                }
                let name = format!("food-{i}");
                store
                    .create(make_food(&name, &[name.as_str()], date(2023, 7, 1)))
                    .unwrap()
            });
        }

        let mut ids = HashSet::new();
        while let Some(res) = tasks.join_next().await {
            assert!(ids.insert(res.unwrap()));
        }
        assert_eq!(ids.len(), 64);
        assert_eq!(store.list_all().len(), 64);
    }
}
