// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock pool implementation for testing.
//!
//! This module provides `MockPool`, a configurable in-memory pool that
//! records all operations and supports failure injection for testing error paths.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{CacheItem, Error, ItemPool, Result};

/// Recorded pool operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOp<V> {
    /// `get_item` was called with the given key.
    GetItem(String),
    /// `has_item` was called with the given key.
    HasItem(String),
    /// `save` was called with the given item.
    Save(CacheItem<V>),
    /// `save_deferred` was called with the given item.
    SaveDeferred(CacheItem<V>),
    /// `commit` was called.
    Commit,
    /// `delete_item` was called with the given key.
    DeleteItem(String),
    /// `clear` was called.
    Clear,
}

type FailPredicate<V> = Box<dyn Fn(&PoolOp<V>) -> bool + Send + Sync>;

/// A configurable mock pool for testing.
///
/// This pool stores items in memory and can be configured to fail
/// operations on demand. All operations are recorded for later verification.
/// Expirations are stored but never enforced.
///
/// # Examples
///
/// ```
/// use stowage_pool::{CacheItem, ItemPool, testing::{MockPool, PoolOp}};
///
/// let pool = MockPool::<i32>::new();
///
/// pool.save(CacheItem::hit("key", 42)).unwrap();
/// assert_eq!(pool.get_item("key").unwrap().get(), Some(&42));
///
/// assert_eq!(pool.operations(), vec![
///     PoolOp::Save(CacheItem::hit("key", 42)),
///     PoolOp::GetItem("key".to_string()),
/// ]);
/// ```
///
/// # Failure Injection
///
/// ```
/// use stowage_pool::{ItemPool, testing::{MockPool, PoolOp}};
///
/// let pool = MockPool::<i32>::new();
///
/// pool.fail_when(|op| matches!(op, PoolOp::GetItem(k) if k == "forbidden"));
/// assert!(pool.get_item("forbidden").is_err());
/// assert!(pool.get_item("allowed").is_ok());
/// ```
pub struct MockPool<V> {
    data: Arc<Mutex<HashMap<String, CacheItem<V>>>>,
    deferred: Arc<Mutex<Vec<CacheItem<V>>>>,
    operations: Arc<Mutex<Vec<PoolOp<V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<V>>>>,
}

impl<V> std::fmt::Debug for MockPool<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPool")
            .field("data", &self.data)
            .field("deferred", &self.deferred)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<V> Clone for MockPool<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            deferred: Arc::clone(&self.deferred),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<V> Default for MockPool<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockPool<V> {
    /// Creates a new empty mock pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            deferred: Arc::new(Mutex::new(Vec::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the number of saved entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns the number of staged entries.
    #[must_use]
    pub fn deferred_count(&self) -> usize {
        self.deferred.lock().len()
    }

    /// Returns true if the pool holds a saved entry for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Sets a predicate that determines when operations should fail.
    ///
    /// The predicate receives the operation and returns `true` if it should fail.
    /// Failed operations are still recorded.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&PoolOp<V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn check(&self, op: PoolOp<V>, message: &'static str) -> Result<()> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        if fail { Err(Error::from_message(message)) } else { Ok(()) }
    }
}

impl<V: Clone> MockPool<V> {
    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<PoolOp<V>> {
        self.operations.lock().clone()
    }
}

impl<V> ItemPool<V> for MockPool<V>
where
    V: Clone + Send + Sync,
{
    fn get_item(&self, key: &str) -> Result<CacheItem<V>> {
        self.check(PoolOp::GetItem(key.to_owned()), "mock: get_item failed")?;
        Ok(self.data.lock().get(key).cloned().unwrap_or_else(|| CacheItem::new(key)))
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        self.check(PoolOp::HasItem(key.to_owned()), "mock: has_item failed")?;
        Ok(self.data.lock().contains_key(key))
    }

    fn clear(&self) -> Result<bool> {
        self.check(PoolOp::Clear, "mock: clear failed")?;
        self.data.lock().clear();
        self.deferred.lock().clear();
        Ok(true)
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        self.check(PoolOp::DeleteItem(key.to_owned()), "mock: delete_item failed")?;
        self.data.lock().remove(key);
        Ok(true)
    }

    fn save(&self, item: CacheItem<V>) -> Result<bool> {
        self.check(PoolOp::Save(item.clone()), "mock: save failed")?;
        let (key, value, expiration) = item.into_parts();
        let Some(value) = value else {
            return Ok(false);
        };
        let mut stored = CacheItem::hit(key.clone(), value);
        stored.set_expiration(expiration);
        self.data.lock().insert(key, stored);
        Ok(true)
    }

    fn save_deferred(&self, item: CacheItem<V>) -> Result<bool> {
        self.check(PoolOp::SaveDeferred(item.clone()), "mock: save_deferred failed")?;
        self.deferred.lock().push(item);
        Ok(true)
    }

    fn commit(&self) -> Result<bool> {
        self.check(PoolOp::Commit, "mock: commit failed")?;
        let staged = std::mem::take(&mut *self.deferred.lock());
        let mut data = self.data.lock();
        let mut all_saved = true;
        for item in staged {
            let (key, value, expiration) = item.into_parts();
            match value {
                Some(value) => {
                    let mut stored = CacheItem::hit(key.clone(), value);
                    stored.set_expiration(expiration);
                    data.insert(key, stored);
                }
                None => all_saved = false,
            }
        }
        Ok(all_saved)
    }
}
