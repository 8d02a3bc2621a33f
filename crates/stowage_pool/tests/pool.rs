// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `ItemPool` default implementations.

use std::collections::HashMap;
use std::sync::Mutex;

use stowage_pool::{CacheItem, DynamicPool, Error, IntoDynamicPool, ItemPool, Result, validate_key};

/// Minimal implementation that only provides required methods
struct MinimalPool {
    data: Mutex<HashMap<String, i32>>,
    broken_key: Option<&'static str>,
}

impl MinimalPool {
    fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            broken_key: None,
        }
    }

    fn failing_on(key: &'static str) -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            broken_key: Some(key),
        }
    }
}

impl ItemPool<i32> for MinimalPool {
    fn get_item(&self, key: &str) -> Result<CacheItem<i32>> {
        validate_key(key)?;
        Ok(match self.data.lock().expect("lock poisoned").get(key) {
            Some(value) => CacheItem::hit(key, *value),
            None => CacheItem::new(key),
        })
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.data.lock().expect("lock poisoned").contains_key(key))
    }

    fn clear(&self) -> Result<bool> {
        self.data.lock().expect("lock poisoned").clear();
        Ok(true)
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        if self.broken_key == Some(key) {
            return Err(Error::from_message("backend unavailable"));
        }
        Ok(self.data.lock().expect("lock poisoned").remove(key).is_some())
    }

    fn save(&self, item: CacheItem<i32>) -> Result<bool> {
        let (key, value, _) = item.into_parts();
        let Some(value) = value else {
            return Ok(false);
        };
        self.data.lock().expect("lock poisoned").insert(key, value);
        Ok(true)
    }

    fn save_deferred(&self, item: CacheItem<i32>) -> Result<bool> {
        self.save(item)
    }

    fn commit(&self) -> Result<bool> {
        Ok(true)
    }
}

#[test]
fn get_items_returns_one_item_per_key_in_order() {
    let pool = MinimalPool::new();
    pool.save(CacheItem::hit("b", 2)).expect("save");

    let items = pool.get_items(&["a", "b", "c"]).expect("get_items");

    let keys: Vec<_> = items.iter().map(CacheItem::key).collect();
    assert_eq!(keys, ["a", "b", "c"]);
    assert!(!items[0].is_hit());
    assert_eq!(items[1].get(), Some(&2));
    assert!(!items[2].is_hit());
}

#[test]
fn get_items_fails_on_first_invalid_key() {
    let pool = MinimalPool::new();
    assert!(pool.get_items(&["ok", "not/ok"]).is_err());
}

#[test]
fn delete_items_reports_overall_success() {
    let pool = MinimalPool::new();
    pool.save(CacheItem::hit("a", 1)).expect("save");
    pool.save(CacheItem::hit("b", 2)).expect("save");

    assert!(pool.delete_items(&["a", "b"]).expect("delete_items"));
    assert!(!pool.delete_items(&["a"]).expect("delete_items"), "absent key reports false here");
}

#[test]
fn delete_items_attempts_every_key_before_failing() {
    let pool = MinimalPool::failing_on("broken");
    pool.save(CacheItem::hit("before", 1)).expect("save");
    pool.save(CacheItem::hit("after", 2)).expect("save");

    let result = pool.delete_items(&["before", "broken", "after"]);

    assert!(result.is_err());
    assert!(!pool.has_item("before").expect("has"));
    assert!(!pool.has_item("after").expect("has"), "keys after the failure are still deleted");
}

#[test]
fn dynamic_pool_forwards_default_methods() {
    let pool: DynamicPool<i32> = MinimalPool::new().into_dynamic();
    pool.save(CacheItem::hit("x", 5)).expect("save");

    let items = pool.get_items(&["x"]).expect("get_items");
    assert_eq!(items[0].get(), Some(&5));
    assert!(pool.delete_items(&["x"]).expect("delete_items"));
}

#[test]
fn saving_an_item_without_value_is_declined() {
    let pool = MinimalPool::new();
    assert!(!pool.save(CacheItem::new("empty")).expect("save"));
    assert!(!pool.has_item("empty").expect("has"));
}
