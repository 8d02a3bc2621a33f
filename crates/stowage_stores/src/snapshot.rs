// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read-only precomputed values in front of a writable fallback.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::RwLock;
use stowage_pool::{CacheItem, DynamicPool, ItemPool, Result, validate_key};

use crate::{
    CacheValue, codec,
    layout::{FileLayout, Fingerprint},
};

type Snapshot<V> = Arc<HashMap<String, V>>;

#[derive(Debug)]
struct Loaded<V> {
    fingerprint: Option<Fingerprint>,
    values: Snapshot<V>,
}

/// Pool for the `phparray` driver.
///
/// A snapshot file holds a fixed set of values written by
/// [`warm_up`](Self::warm_up). Keys present in the snapshot are served from
/// it and never expire; they cannot be overwritten or deleted through the
/// pool, so writes and deletes on them report `false`. Every other key is
/// delegated to the fallback pool.
///
/// The snapshot is read from disk on first use and kept in memory until the
/// file changes, so a snapshot written by another handle or process is
/// picked up on the next access.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
///
/// use stowage_pool::{CacheItem, IntoDynamicPool, ItemPool};
/// use stowage_stores::{MemoryBackend, SnapshotPool, StorePool};
/// use tick::Clock;
///
/// let dir = tempfile::tempdir()?;
/// let fallback = StorePool::new(MemoryBackend::<u32>::new(true), Clock::new_frozen()).into_dynamic();
/// let pool = SnapshotPool::new(dir.path().join("routes.snapshot"), fallback);
///
/// pool.warm_up(HashMap::from([("home".to_string(), 1)]))?;
/// assert_eq!(pool.get_item("home")?.get(), Some(&1));
/// assert!(!pool.save(CacheItem::hit("home", 2))?);
///
/// assert!(pool.save(CacheItem::hit("about", 3))?);
/// assert_eq!(pool.get_item("about")?.get(), Some(&3));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct SnapshotPool<V> {
    path: PathBuf,
    fallback: DynamicPool<V>,
    snapshot: RwLock<Option<Loaded<V>>>,
}

impl<V> SnapshotPool<V> {
    /// Creates a pool reading its snapshot from `path`.
    pub fn new(path: impl Into<PathBuf>, fallback: DynamicPool<V>) -> Self {
        Self {
            path: path.into(),
            fallback,
            snapshot: RwLock::new(None),
        }
    }

    /// Returns the snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the pool that receives keys outside the snapshot.
    #[must_use]
    pub fn fallback(&self) -> &DynamicPool<V> {
        &self.fallback
    }
}

impl<V> SnapshotPool<V>
where
    V: CacheValue,
{
    /// Replaces the snapshot with `values`.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is invalid or the file cannot be written.
    pub fn warm_up(&self, values: HashMap<String, V>) -> Result<()> {
        for key in values.keys() {
            validate_key(key)?;
        }

        let mut slot = self.snapshot.write();
        FileLayout::write_atomic(&self.path, &codec::encode(&values)?)?;
        *slot = Some(Loaded {
            fingerprint: Fingerprint::of(&self.path)?,
            values: Arc::new(values),
        });
        tracing::debug!(path = %self.path.display(), "snapshot written");
        Ok(())
    }

    fn snapshot(&self) -> Result<Snapshot<V>> {
        let fingerprint = Fingerprint::of(&self.path)?;
        if let Some(loaded) = self.snapshot.read().as_ref()
            && loaded.fingerprint == fingerprint
        {
            return Ok(Arc::clone(&loaded.values));
        }

        let mut slot = self.snapshot.write();
        let fingerprint = Fingerprint::of(&self.path)?;
        if let Some(loaded) = slot.as_ref()
            && loaded.fingerprint == fingerprint
        {
            return Ok(Arc::clone(&loaded.values));
        }

        let values: HashMap<String, V> = match FileLayout::read(&self.path)? {
            Some(bytes) => codec::decode(&bytes)?,
            None => HashMap::new(),
        };
        let values = Arc::new(values);
        *slot = Some(Loaded {
            fingerprint,
            values: Arc::clone(&values),
        });
        tracing::debug!(path = %self.path.display(), entries = values.len(), "snapshot loaded");
        Ok(values)
    }

    fn in_snapshot(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.snapshot()?.contains_key(key))
    }
}

impl<V> ItemPool<V> for SnapshotPool<V>
where
    V: CacheValue,
{
    fn get_item(&self, key: &str) -> Result<CacheItem<V>> {
        validate_key(key)?;
        match self.snapshot()?.get(key) {
            Some(value) => Ok(CacheItem::hit(key, value.clone())),
            None => self.fallback.get_item(key),
        }
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        if self.in_snapshot(key)? {
            return Ok(true);
        }
        self.fallback.has_item(key)
    }

    fn clear(&self) -> Result<bool> {
        let removed = {
            let mut slot = self.snapshot.write();
            let removed = FileLayout::remove(&self.path)?;
            *slot = Some(Loaded {
                fingerprint: None,
                values: Arc::default(),
            });
            removed
        };
        Ok(self.fallback.clear()? && removed)
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        if self.in_snapshot(key)? {
            return Ok(false);
        }
        self.fallback.delete_item(key)
    }

    fn save(&self, item: CacheItem<V>) -> Result<bool> {
        if self.in_snapshot(item.key())? {
            return Ok(false);
        }
        self.fallback.save(item)
    }

    fn save_deferred(&self, item: CacheItem<V>) -> Result<bool> {
        if self.in_snapshot(item.key())? {
            return Ok(false);
        }
        self.fallback.save_deferred(item)
    }

    fn commit(&self) -> Result<bool> {
        self.fallback.commit()
    }
}
