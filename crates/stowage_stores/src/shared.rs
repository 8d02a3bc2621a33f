// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide segments shared by every backend with the same namespace.

use std::{
    collections::HashMap,
    marker::PhantomData,
    sync::Arc,
    time::{Duration, SystemTime},
};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use stowage_pool::Result;

use crate::{Backend, CacheValue, Record, codec, validate_namespace};

#[derive(Debug)]
struct Entry {
    expires_at: Option<SystemTime>,
    bytes: Arc<[u8]>,
}

#[derive(Debug, Default)]
struct Segment {
    version: Mutex<Option<String>>,
    entries: RwLock<HashMap<String, Entry>>,
}

static SEGMENTS: Lazy<Mutex<HashMap<String, Arc<Segment>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Backend for the `apcu` driver.
///
/// All backends created with the same namespace in one process read and
/// write the same segment, regardless of which store or manager created
/// them. Records are held encoded.
///
/// A backend created with a `version` different from the one the segment
/// was last opened with clears the segment first. This lets a deployment
/// drop everything cached by a previous release.
///
/// Expired records stay in the segment until they are read, pruned, or
/// swept by the periodic prune of a [`StorePool`](crate::StorePool) writing
/// to the segment.
///
/// # Examples
///
/// ```
/// use stowage_pool::{CacheItem, ItemPool};
/// use stowage_stores::{SharedMemoryBackend, StorePool};
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let writer = StorePool::new(SharedMemoryBackend::<u32>::new("docs-shared", None)?, clock.clone());
/// let reader = StorePool::new(SharedMemoryBackend::<u32>::new("docs-shared", None)?, clock);
///
/// writer.save(CacheItem::hit("visits", 3))?;
/// assert_eq!(reader.get_item("visits")?.get(), Some(&3));
/// # Ok::<(), stowage_pool::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SharedMemoryBackend<V> {
    namespace: String,
    segment: Arc<Segment>,
    _phantom: PhantomData<fn() -> V>,
}

impl<V> SharedMemoryBackend<V> {
    /// Opens the segment for `namespace`, clearing it on a version change.
    ///
    /// # Errors
    ///
    /// Returns an error if `namespace` contains characters outside `-+_.A-Za-z0-9`.
    pub fn new(namespace: &str, version: Option<&str>) -> Result<Self> {
        validate_namespace(namespace)?;
        let segment = Arc::clone(SEGMENTS.lock().entry(namespace.to_owned()).or_default());

        if let Some(version) = version {
            let mut current = segment.version.lock();
            if current.as_deref() != Some(version) {
                if current.is_some() {
                    tracing::info!(cache.namespace = namespace, cache.version = version, "shared cache segment reset");
                }
                segment.entries.write().clear();
                *current = Some(version.to_owned());
            }
        }

        Ok(Self {
            namespace: namespace.to_owned(),
            segment,
            _phantom: PhantomData,
        })
    }

    /// Returns the namespace of the shared segment.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the number of records in the shared segment.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.segment.entries.read().len()
    }
}

impl<V> Backend<V> for SharedMemoryBackend<V>
where
    V: CacheValue,
{
    fn fetch(&self, key: &str) -> Result<Option<Record<V>>> {
        let bytes = self.segment.entries.read().get(key).map(|entry| Arc::clone(&entry.bytes));
        bytes.map(|bytes| codec::decode(&bytes)).transpose()
    }

    fn store(&self, key: &str, record: Record<V>, _ttl: Option<Duration>) -> Result<bool> {
        let entry = Entry {
            expires_at: record.expires_at,
            bytes: codec::encode(&record)?.into(),
        };
        self.segment.entries.write().insert(key.to_owned(), entry);
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.segment.entries.write().remove(key);
        Ok(true)
    }

    fn purge(&self) -> Result<bool> {
        self.segment.entries.write().clear();
        Ok(true)
    }

    fn prune(&self, now: SystemTime) -> Result<usize> {
        let mut entries = self.segment.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_namespace_shares_entries() {
        let a = SharedMemoryBackend::<u8>::new("shared-unit-a", None).expect("backend");
        let b = SharedMemoryBackend::<u8>::new("shared-unit-a", None).expect("backend");

        a.store("k", Record::new(1, None), None).expect("store");
        assert_eq!(b.fetch("k").expect("fetch"), Some(Record::new(1, None)));
    }

    #[test]
    fn different_namespaces_are_isolated() {
        let a = SharedMemoryBackend::<u8>::new("shared-unit-b1", None).expect("backend");
        let b = SharedMemoryBackend::<u8>::new("shared-unit-b2", None).expect("backend");

        a.store("k", Record::new(1, None), None).expect("store");
        assert_eq!(b.fetch("k").expect("fetch"), None);
    }

    #[test]
    fn prune_sweeps_the_whole_segment() {
        let writer = SharedMemoryBackend::<u8>::new("shared-unit-d", None).expect("backend");
        let other = SharedMemoryBackend::<u8>::new("shared-unit-d", None).expect("backend");
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(100);

        writer.store("gone", Record::new(1, Some(now)), None).expect("store");
        writer.store("kept", Record::new(2, Some(now + Duration::from_secs(1))), None).expect("store");

        assert_eq!(other.prune(now).expect("prune"), 1);
        assert_eq!(writer.entry_count(), 1);
        assert!(writer.fetch("kept").expect("fetch").is_some());
    }

    #[test]
    fn version_change_clears_segment() {
        let v1 = SharedMemoryBackend::<u8>::new("shared-unit-c", Some("1")).expect("backend");
        v1.store("k", Record::new(1, None), None).expect("store");

        let same = SharedMemoryBackend::<u8>::new("shared-unit-c", Some("1")).expect("backend");
        assert!(same.fetch("k").expect("fetch").is_some(), "same version keeps entries");

        let v2 = SharedMemoryBackend::<u8>::new("shared-unit-c", Some("2")).expect("backend");
        assert_eq!(v2.fetch("k").expect("fetch"), None);
        assert_eq!(v1.fetch("k").expect("fetch"), None, "older handles see the reset too");
    }
}
