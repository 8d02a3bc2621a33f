// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Convenience facade over one store.

use std::{collections::HashMap, sync::Arc};

use stowage_pool::{CacheItem, DynamicPool, Error, ItemPool, Result};
use stowage_stores::{CacheValue, SnapshotPool};
use tick::Clock;

use crate::{
    Ttl,
    telemetry::{CacheActivity, CacheOperation, Telemetry},
    ttl::FOREVER,
};

/// A named store with convenience methods.
///
/// Repositories are what [`CacheManager::driver`](crate::CacheManager::driver)
/// hands out. Clones share the same store. Every call is timed and recorded
/// through the manager's telemetry.
///
/// Expired entries are indistinguishable from absent ones: [`get`](Self::get),
/// [`has`](Self::has) and [`pull`](Self::pull) only see values the store
/// reports as live.
///
/// # Examples
///
/// ```
/// use stowage::{CacheManager, ManagerConfig, StoreConfig};
///
/// let manager = CacheManager::<String>::new(
///     ManagerConfig::new("local").with_store("local", StoreConfig::new("array")),
/// );
/// let cache = manager.driver("local")?;
///
/// cache.put("greeting", "hello".to_string(), 0)?;
/// assert_eq!(cache.get("greeting")?.as_deref(), Some("hello"));
///
/// let value = cache.remember("answer", 60, || "42".to_string())?;
/// assert_eq!(value, "42");
///
/// assert_eq!(cache.pull("greeting")?.as_deref(), Some("hello"));
/// assert!(!cache.has("greeting")?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Repository<V> {
    name: Arc<str>,
    pool: DynamicPool<V>,
    snapshot: Option<Arc<SnapshotPool<V>>>,
    clock: Clock,
    telemetry: Telemetry,
}

impl<V> Clone for Repository<V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            pool: self.pool.clone(),
            snapshot: self.snapshot.clone(),
            clock: self.clock.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

impl<V> std::fmt::Debug for Repository<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<V> Repository<V> {
    /// Wraps `pool` under `name`, without telemetry.
    pub fn new(name: impl Into<Arc<str>>, pool: DynamicPool<V>, clock: Clock) -> Self {
        Self::with_telemetry(name, pool, clock, Telemetry::default())
    }

    pub(crate) fn with_telemetry(name: impl Into<Arc<str>>, pool: DynamicPool<V>, clock: Clock, telemetry: Telemetry) -> Self {
        Self {
            name: name.into(),
            pool,
            snapshot: None,
            clock,
            telemetry,
        }
    }

    pub(crate) fn with_snapshot(mut self, snapshot: Option<Arc<SnapshotPool<V>>>) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Returns the store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying store, bypassing telemetry.
    #[must_use]
    pub fn pool(&self) -> &DynamicPool<V> {
        &self.pool
    }

    fn observe<T>(
        &self,
        operation: CacheOperation,
        call: impl FnOnce(&DynamicPool<V>) -> Result<T>,
        activity: impl FnOnce(&T) -> CacheActivity,
    ) -> Result<T> {
        if !self.telemetry.is_enabled() {
            return call(&self.pool);
        }

        let watch = self.clock.stopwatch();
        let result = call(&self.pool);
        let activity = result.as_ref().map_or(CacheActivity::Error, activity);
        self.telemetry.record(&self.name, operation, activity, watch.elapsed());
        result
    }
}

impl<V> Repository<V>
where
    V: CacheValue,
{
    /// Replaces the precomputed values of a `phparray` store.
    ///
    /// Every handle on the store serves the new values from the next read,
    /// as do other stores reading the same snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not a `phparray` store, a key is
    /// invalid, or the snapshot file cannot be written.
    pub fn warm_up(&self, values: HashMap<String, V>) -> Result<()> {
        match &self.snapshot {
            Some(snapshot) => snapshot.warm_up(values),
            None => Err(Error::from_message(format!("store `{}` has no snapshot to warm up", self.name))),
        }
    }
}

impl<V> Repository<V>
where
    V: Clone + Send + Sync,
{
    /// Returns the live value for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        if !self.has_item(key)? {
            return Ok(None);
        }
        let item = self.get_item(key)?;
        Ok(if item.is_hit() { item.into_value() } else { None })
    }

    /// Returns the live value for `key`, or `default`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn get_or(&self, key: &str, default: V) -> Result<V> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Returns `true` if `key` holds a live value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn has(&self, key: &str) -> Result<bool> {
        self.has_item(key)
    }

    /// Returns the value for `key`, producing and storing it first if absent.
    ///
    /// `producer` runs at most once, and only when the key holds no live value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn remember(&self, key: &str, ttl: impl Into<Ttl>, producer: impl FnOnce() -> V) -> Result<V> {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let value = producer();
        self.put(key, value.clone(), ttl)?;
        Ok(value)
    }

    /// Like [`remember`](Self::remember) with a producer that can fail.
    ///
    /// A failing producer's error is returned and nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns the producer's error, or a store error converted into `E`.
    pub fn try_remember<E>(&self, key: &str, ttl: impl Into<Ttl>, producer: impl FnOnce() -> std::result::Result<V, E>) -> std::result::Result<V, E>
    where
        E: From<Error>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let value = producer()?;
        self.put(key, value.clone(), ttl)?;
        Ok(value)
    }

    /// Removes `key` and returns its value, if it held a live one.
    ///
    /// Nothing is deleted when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn pull(&self, key: &str) -> Result<Option<V>> {
        let value = self.get(key)?;
        if value.is_some() {
            self.delete_item(key)?;
        }
        Ok(value)
    }

    /// Stores `value` under `key`.
    ///
    /// Returns the store's save flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn put(&self, key: &str, value: V, ttl: impl Into<Ttl>) -> Result<bool> {
        self.save(Self::item(key, value, ttl.into()))
    }

    /// Stores `value` only if `key` holds no live value.
    ///
    /// Returns `false` without writing if the key is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn add(&self, key: &str, value: V, ttl: impl Into<Ttl>) -> Result<bool> {
        if self.has(key)? {
            return Ok(false);
        }
        self.put(key, value, ttl)
    }

    /// Stages `value` under `key` until the next [`commit`](ItemPool::commit).
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn defer(&self, key: &str, value: V, ttl: impl Into<Ttl>) -> Result<bool> {
        self.save_deferred(Self::item(key, value, ttl.into()))
    }

    /// Stores `value` with the [`FOREVER`](crate::FOREVER) lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn forever(&self, key: &str, value: V) -> Result<bool> {
        self.put(key, value, FOREVER)
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub fn forget(&self, key: &str) -> Result<bool> {
        self.delete_item(key)
    }

    fn item(key: &str, value: V, ttl: Ttl) -> CacheItem<V> {
        let mut item = CacheItem::new(key);
        item.set(value).set_expiration(ttl.into_expiration());
        item
    }
}

impl<V> ItemPool<V> for Repository<V>
where
    V: Send + Sync,
{
    fn get_item(&self, key: &str) -> Result<CacheItem<V>> {
        self.observe(
            CacheOperation::Get,
            |pool| pool.get_item(key),
            |item| if item.is_hit() { CacheActivity::Hit } else { CacheActivity::Miss },
        )
    }

    fn get_items(&self, keys: &[&str]) -> Result<Vec<CacheItem<V>>> {
        self.observe(
            CacheOperation::Get,
            |pool| pool.get_items(keys),
            |items| {
                if items.iter().all(CacheItem::is_hit) {
                    CacheActivity::Hit
                } else {
                    CacheActivity::Miss
                }
            },
        )
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        self.observe(
            CacheOperation::Has,
            |pool| pool.has_item(key),
            |found| if *found { CacheActivity::Hit } else { CacheActivity::Miss },
        )
    }

    fn clear(&self) -> Result<bool> {
        self.observe(
            CacheOperation::Clear,
            |pool| pool.clear(),
            |done| CacheActivity::from_flag(*done, CacheActivity::Cleared),
        )
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        self.observe(
            CacheOperation::Delete,
            |pool| pool.delete_item(key),
            |done| CacheActivity::from_flag(*done, CacheActivity::Deleted),
        )
    }

    fn delete_items(&self, keys: &[&str]) -> Result<bool> {
        self.observe(
            CacheOperation::Delete,
            |pool| pool.delete_items(keys),
            |done| CacheActivity::from_flag(*done, CacheActivity::Deleted),
        )
    }

    fn save(&self, item: CacheItem<V>) -> Result<bool> {
        self.observe(
            CacheOperation::Save,
            |pool| pool.save(item),
            |done| CacheActivity::from_flag(*done, CacheActivity::Stored),
        )
    }

    fn save_deferred(&self, item: CacheItem<V>) -> Result<bool> {
        self.observe(
            CacheOperation::SaveDeferred,
            |pool| pool.save_deferred(item),
            |done| CacheActivity::from_flag(*done, CacheActivity::Deferred),
        )
    }

    fn commit(&self) -> Result<bool> {
        self.observe(
            CacheOperation::Commit,
            |pool| pool.commit(),
            |done| CacheActivity::from_flag(*done, CacheActivity::Committed),
        )
    }
}
