// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type-erased, shareable pool handle.

use std::{fmt::Debug, sync::Arc};

use crate::{CacheItem, ItemPool, Result};

/// Extension trait for converting any `ItemPool` into a `DynamicPool`.
///
/// This trait is automatically implemented for all types that implement `ItemPool`.
///
/// # Examples
///
/// ```
/// use stowage_pool::{DynamicPool, IntoDynamicPool, ItemPool};
///
/// fn erase<P>(pool: P) -> DynamicPool<String>
/// where
///     P: ItemPool<String> + 'static,
/// {
///     pool.into_dynamic()
/// }
/// ```
pub trait IntoDynamicPool<V>: Sized {
    /// Converts this pool into a `DynamicPool`.
    fn into_dynamic(self) -> DynamicPool<V>;
}

impl<V, P> IntoDynamicPool<V> for P
where
    P: ItemPool<V> + 'static,
{
    fn into_dynamic(self) -> DynamicPool<V> {
        DynamicPool::new(self)
    }
}

/// A clonable pool handle with type erasure.
///
/// `DynamicPool` wraps a trait object in an `Arc`. Clones share the same
/// underlying store, which is how one store is reused by several owners.
pub struct DynamicPool<V>(Arc<dyn ItemPool<V>>);

impl<V> DynamicPool<V> {
    /// Creates a new dynamic pool from any `ItemPool` implementation.
    pub fn new<P>(pool: P) -> Self
    where
        P: ItemPool<V> + 'static,
    {
        Self(Arc::new(pool))
    }

    /// Returns `true` if both handles point at the same store.
    #[must_use]
    pub fn same_store(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl<V> From<Arc<dyn ItemPool<V>>> for DynamicPool<V> {
    fn from(pool: Arc<dyn ItemPool<V>>) -> Self {
        Self(pool)
    }
}

impl<V> Debug for DynamicPool<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicPool").finish_non_exhaustive()
    }
}

impl<V> Clone for DynamicPool<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V> ItemPool<V> for DynamicPool<V> {
    fn get_item(&self, key: &str) -> Result<CacheItem<V>> {
        self.0.get_item(key)
    }

    fn get_items(&self, keys: &[&str]) -> Result<Vec<CacheItem<V>>> {
        self.0.get_items(keys)
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        self.0.has_item(key)
    }

    fn clear(&self) -> Result<bool> {
        self.0.clear()
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        self.0.delete_item(key)
    }

    fn delete_items(&self, keys: &[&str]) -> Result<bool> {
        self.0.delete_items(keys)
    }

    fn save(&self, item: CacheItem<V>) -> Result<bool> {
        self.0.save(item)
    }

    fn save_deferred(&self, item: CacheItem<V>) -> Result<bool> {
        self.0.save_deferred(item)
    }

    fn commit(&self) -> Result<bool> {
        self.0.commit()
    }
}
