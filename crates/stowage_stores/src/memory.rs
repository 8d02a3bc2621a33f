// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process storage backed by moka.

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use moka::{Expiry, sync::Cache};
use stowage_pool::Result;

use crate::{Backend, CacheValue, Record, codec};

#[derive(Clone, Debug)]
enum Payload<V> {
    Shared(Record<V>),
    Encoded(Arc<[u8]>),
}

#[derive(Clone, Debug)]
struct Slot<V> {
    payload: Payload<V>,
    expires_at: Option<SystemTime>,
    ttl: Option<Duration>,
}

/// Lets moka drop a slot once the lifetime it was written with has passed.
struct RemainingLifetime;

impl<V> Expiry<String, Slot<V>> for RemainingLifetime {
    fn expire_after_create(&self, _key: &String, value: &Slot<V>, _created_at: Instant) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Slot<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Backend for the `array` driver.
///
/// Values live in a concurrent moka cache owned by this backend. With
/// `serialize` enabled each record is stored encoded, so callers never
/// observe aliasing between what they saved and what they read back;
/// otherwise records are cloned in and out.
///
/// moka evicts each record once the lifetime it was saved with has elapsed
/// in real time. [`prune`](Backend::prune) removes records expired by the
/// pool clock, which may run ahead of real time.
///
/// # Examples
///
/// ```
/// use stowage_pool::{CacheItem, ItemPool};
/// use stowage_stores::{MemoryBackend, StorePool};
/// use tick::Clock;
///
/// let pool = StorePool::new(MemoryBackend::<Vec<u8>>::with_capacity(true, 1_000), Clock::new_frozen());
/// pool.save(CacheItem::hit("bytes", vec![1, 2, 3]))?;
/// assert!(pool.has_item("bytes")?);
/// # Ok::<(), stowage_pool::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, Slot<V>>,
    serialize: bool,
}

impl<V> MemoryBackend<V>
where
    V: CacheValue,
{
    /// Creates an unbounded backend.
    #[must_use]
    pub fn new(serialize: bool) -> Self {
        Self {
            inner: Cache::builder().expire_after(RemainingLifetime).build(),
            serialize,
        }
    }

    /// Creates a backend that evicts once `max_capacity` entries are held.
    #[must_use]
    pub fn with_capacity(serialize: bool, max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(RemainingLifetime)
                .build(),
            serialize,
        }
    }

    /// Returns `true` if records are stored encoded.
    #[must_use]
    pub fn serializes(&self) -> bool {
        self.serialize
    }

    /// Returns the number of stored records.
    ///
    /// Records expired by the pool clock count until they are read or pruned.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl<V> Backend<V> for MemoryBackend<V>
where
    V: CacheValue,
{
    fn fetch(&self, key: &str) -> Result<Option<Record<V>>> {
        match self.inner.get(key).map(|slot| slot.payload) {
            Some(Payload::Shared(record)) => Ok(Some(record)),
            Some(Payload::Encoded(bytes)) => codec::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn store(&self, key: &str, record: Record<V>, ttl: Option<Duration>) -> Result<bool> {
        let expires_at = record.expires_at;
        let payload = if self.serialize {
            Payload::Encoded(codec::encode(&record)?.into())
        } else {
            Payload::Shared(record)
        };
        self.inner.insert(key.to_owned(), Slot { payload, expires_at, ttl });
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.inner.invalidate(key);
        Ok(true)
    }

    fn purge(&self) -> Result<bool> {
        self.inner.invalidate_all();
        Ok(true)
    }

    fn prune(&self, now: SystemTime) -> Result<usize> {
        let expired: Vec<_> = self
            .inner
            .iter()
            .filter(|(_, slot)| slot.expires_at.is_some_and(|at| at <= now))
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.inner.invalidate(key.as_str());
        }
        self.inner.run_pending_tasks();
        Ok(expired.len())
    }
}
