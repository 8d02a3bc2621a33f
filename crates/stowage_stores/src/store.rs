// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pool that adds expiry, default lifetime and deferred saves to a backend.

use std::{
    collections::HashMap,
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use stowage_pool::{CacheItem, Error, Expiration, ItemPool, Result, validate_key};
use tick::Clock;

use crate::{Backend, Record};

/// Implements [`ItemPool`] on top of a [`Backend`].
///
/// - Keys are validated before reaching the backend.
/// - Records past their expiry read as misses and are removed from the
///   backend on that read.
/// - Every [`PRUNE_INTERVAL`] writes the backend is asked to drop all expired
///   records; [`prune`](Self::prune) does the same on demand.
/// - Items saved without an expiration receive the default lifetime.
/// - Saving an item whose expiry is not in the future deletes the key.
/// - Deferred items stay in memory until [`commit`](ItemPool::commit); reading
///   a staged key commits first, so staged values are never invisible.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stowage_pool::{CacheItem, ItemPool};
/// use stowage_stores::{MemoryBackend, StorePool};
/// use tick::ClockControl;
///
/// let control = ClockControl::new();
/// let pool = StorePool::new(MemoryBackend::<String>::new(false), control.to_clock())
///     .default_lifetime(Some(Duration::from_secs(10)));
///
/// let mut item = CacheItem::new("greeting");
/// item.set("hello".to_string());
/// pool.save(item)?;
/// assert!(pool.has_item("greeting")?);
///
/// control.advance(Duration::from_secs(10));
/// assert!(!pool.has_item("greeting")?);
/// # Ok::<(), stowage_pool::Error>(())
/// ```
pub struct StorePool<B, V> {
    backend: B,
    clock: Clock,
    default_lifetime: Option<Duration>,
    deferred: Mutex<HashMap<String, CacheItem<V>>>,
    writes: AtomicU64,
    _phantom: PhantomData<fn() -> V>,
}

/// Number of writes between two automatic [`Backend::prune`] calls.
pub const PRUNE_INTERVAL: u64 = 256;

impl<B, V> std::fmt::Debug for StorePool<B, V>
where
    B: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePool")
            .field("backend", &self.backend)
            .field("default_lifetime", &self.default_lifetime)
            .field("deferred", &self.deferred.lock().len())
            .finish_non_exhaustive()
    }
}

impl<B, V> StorePool<B, V> {
    /// Creates a pool over `backend` with no default lifetime.
    pub fn new(backend: B, clock: Clock) -> Self {
        Self {
            backend,
            clock,
            default_lifetime: None,
            deferred: Mutex::new(HashMap::new()),
            writes: AtomicU64::new(0),
            _phantom: PhantomData,
        }
    }

    /// Sets the lifetime applied to items saved without an expiration.
    ///
    /// `None` and a zero duration both mean "no expiry".
    #[must_use]
    pub fn default_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.default_lifetime = lifetime.filter(|d| !d.is_zero());
        self
    }

    /// Returns the wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the clock used to evaluate expirations.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    fn is_deferred(&self, key: &str) -> bool {
        self.deferred.lock().contains_key(key)
    }
}

impl<B, V> StorePool<B, V>
where
    B: Backend<V>,
    V: Send + Sync,
{
    fn fetch_live(&self, key: &str) -> Result<Option<Record<V>>> {
        validate_key(key)?;
        if self.is_deferred(key) {
            self.commit()?;
        }

        match self.backend.fetch(key)? {
            Some(record) if record.is_expired(self.clock.system_time()) => {
                self.backend.remove(key)?;
                Ok(None)
            }
            live => Ok(live),
        }
    }

    /// Removes every expired record from the backend and returns how many.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn prune(&self) -> Result<usize> {
        self.backend.prune(self.clock.system_time())
    }

    fn write(&self, key: String, value: V, expiration: Option<Expiration>) -> Result<bool> {
        let now = self.clock.system_time();
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % PRUNE_INTERVAL == 0 {
            self.backend.prune(now)?;
        }
        let expires_at = match expiration {
            Some(expiration) => expiration.deadline(now),
            None => self.default_lifetime.and_then(|lifetime| now.checked_add(lifetime)),
        };

        let ttl = match expires_at {
            None => None,
            Some(at) => match at.duration_since(now) {
                Ok(remaining) if !remaining.is_zero() => Some(remaining),
                // Already expired: nothing may stay visible under this key.
                _ => return self.backend.remove(&key),
            },
        };

        self.backend.store(&key, Record::new(value, expires_at), ttl)
    }
}

impl<B, V> ItemPool<V> for StorePool<B, V>
where
    B: Backend<V>,
    V: Send + Sync,
{
    fn get_item(&self, key: &str) -> Result<CacheItem<V>> {
        Ok(match self.fetch_live(key)? {
            Some(record) => {
                let mut item = CacheItem::hit(key, record.value);
                item.expires_at(record.expires_at);
                item
            }
            None => CacheItem::new(key),
        })
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        Ok(self.fetch_live(key)?.is_some())
    }

    fn clear(&self) -> Result<bool> {
        self.deferred.lock().clear();
        self.backend.purge()
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.deferred.lock().remove(key);
        self.backend.remove(key)
    }

    fn save(&self, item: CacheItem<V>) -> Result<bool> {
        validate_key(item.key())?;
        let (key, value, expiration) = item.into_parts();
        match value {
            Some(value) => self.write(key, value, expiration),
            None => Ok(false),
        }
    }

    fn save_deferred(&self, mut item: CacheItem<V>) -> Result<bool> {
        validate_key(item.key())?;
        if item.get().is_none() {
            return Ok(false);
        }

        // Relative expirations count from the moment the item is staged.
        if let Some(Expiration::After(after)) = item.expiration() {
            item.expires_at(self.clock.system_time().checked_add(after));
        }

        self.deferred.lock().insert(item.key().to_owned(), item);
        Ok(true)
    }

    fn commit(&self) -> Result<bool> {
        let staged = std::mem::take(&mut *self.deferred.lock());
        let mut all_saved = true;
        let mut first_error: Option<Error> = None;

        for item in staged.into_values() {
            match self.save(item) {
                Ok(saved) => all_saved &= saved,
                Err(e) => {
                    all_saved = false;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(all_saved),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use tick::ClockControl;

    use super::*;
    use crate::MemoryBackend;

    fn pool(control: &ClockControl) -> StorePool<MemoryBackend<i32>, i32> {
        StorePool::new(MemoryBackend::new(true), control.to_clock())
    }

    fn item(key: &str, value: i32) -> CacheItem<i32> {
        let mut item = CacheItem::new(key);
        item.set(value);
        item
    }

    #[test]
    fn expired_record_reads_as_miss() {
        let control = ClockControl::new();
        let pool = pool(&control);
        let mut it = item("k", 1);
        it.expires_after(Some(Duration::from_secs(5)));
        assert!(pool.save(it).expect("save"));

        control.advance(Duration::from_secs(4));
        assert!(pool.get_item("k").expect("get").is_hit());

        control.advance(Duration::from_secs(1));
        assert!(!pool.get_item("k").expect("get").is_hit());
        assert!(!pool.has_item("k").expect("has"));
        assert_eq!(pool.backend().entry_count(), 0, "expired record is dropped on read");
    }

    #[test]
    fn hit_item_carries_absolute_expiry() {
        let control = ClockControl::new();
        let pool = pool(&control);
        let mut it = item("k", 1);
        it.expires_after(Some(Duration::from_secs(5)));
        pool.save(it).expect("save");

        let expected = control.to_clock().system_time() + Duration::from_secs(5);
        assert_eq!(pool.get_item("k").expect("get").expiration(), Some(Expiration::At(expected)));
    }

    #[test]
    fn default_lifetime_applies_only_without_expiration() {
        let control = ClockControl::new();
        let pool = pool(&control).default_lifetime(Some(Duration::from_secs(2)));

        pool.save(item("short", 1)).expect("save");
        let mut long = item("long", 2);
        long.expires_after(Some(Duration::from_secs(60)));
        pool.save(long).expect("save");

        control.advance(Duration::from_secs(3));
        assert!(!pool.has_item("short").expect("has"));
        assert!(pool.has_item("long").expect("has"));
    }

    #[test]
    fn zero_default_lifetime_means_no_expiry() {
        let control = ClockControl::new();
        let pool = pool(&control).default_lifetime(Some(Duration::ZERO));
        pool.save(item("k", 1)).expect("save");

        control.advance(Duration::from_secs(1_000_000));
        assert!(pool.has_item("k").expect("has"));
    }

    #[test]
    fn saving_an_already_expired_item_deletes_the_key() {
        let control = ClockControl::new();
        let pool = pool(&control);
        pool.save(item("k", 1)).expect("save");

        let mut stale = item("k", 2);
        stale.expires_at(Some(SystemTime::UNIX_EPOCH));
        assert!(pool.save(stale).expect("save"));
        assert!(!pool.has_item("k").expect("has"));
    }

    #[test]
    fn saving_without_value_is_declined() {
        let control = ClockControl::new();
        let pool = pool(&control);
        assert!(!pool.save(CacheItem::new("k")).expect("save"));
        assert!(!pool.save_deferred(CacheItem::new("k")).expect("save_deferred"));
    }

    #[test]
    fn deferred_item_is_visible_before_commit() {
        let control = ClockControl::new();
        let pool = pool(&control);

        assert!(pool.save_deferred(item("k", 9)).expect("save_deferred"));
        assert!(pool.has_item("k").expect("has"));
        assert_eq!(pool.get_item("k").expect("get").get(), Some(&9));
    }

    #[test]
    fn commit_flushes_every_staged_item() {
        let control = ClockControl::new();
        let pool = pool(&control);
        pool.save_deferred(item("a", 1)).expect("save_deferred");
        pool.save_deferred(item("b", 2)).expect("save_deferred");

        assert!(pool.commit().expect("commit"));
        assert_eq!(pool.backend().entry_count(), 2);
        assert!(pool.commit().expect("empty commit succeeds"));
    }

    #[test]
    fn deferred_relative_expiry_counts_from_staging() {
        let control = ClockControl::new();
        let pool = pool(&control);
        let mut it = item("k", 1);
        it.expires_after(Some(Duration::from_secs(5)));
        pool.save_deferred(it).expect("save_deferred");

        control.advance(Duration::from_secs(5));
        assert!(pool.commit().expect("commit"));
        assert!(!pool.has_item("k").expect("has"));
    }

    #[test]
    fn clear_drops_staged_items() {
        let control = ClockControl::new();
        let pool = pool(&control);
        pool.save(item("saved", 1)).expect("save");
        pool.save_deferred(item("staged", 2)).expect("save_deferred");

        assert!(pool.clear().expect("clear"));
        assert!(!pool.has_item("saved").expect("has"));
        assert!(!pool.has_item("staged").expect("has"));
    }

    #[test]
    fn delete_drops_staged_item() {
        let control = ClockControl::new();
        let pool = pool(&control);
        pool.save_deferred(item("k", 1)).expect("save_deferred");

        assert!(pool.delete_item("k").expect("delete"));
        assert!(!pool.has_item("k").expect("has"));
    }

    #[test]
    fn invalid_keys_are_rejected_everywhere() {
        let control = ClockControl::new();
        let pool = pool(&control);

        assert!(pool.get_item("a:b").is_err());
        assert!(pool.has_item("").is_err());
        assert!(pool.delete_item("a{b").is_err());
        assert!(pool.save(item("a/b", 1)).is_err());
        assert!(pool.save_deferred(item("a@b", 1)).is_err());
    }
}
