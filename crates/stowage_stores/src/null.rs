// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;

use stowage_pool::{CacheItem, ItemPool, Result, validate_key};

/// Pool for the `null` driver: accepts calls, stores nothing.
///
/// Reads always miss and writes report `false`, while removals report
/// success since there is never anything left to remove.
pub struct NullPool<V> {
    _phantom: PhantomData<fn() -> V>,
}

impl<V> std::fmt::Debug for NullPool<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NullPool")
    }
}

impl<V> Clone for NullPool<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> Default for NullPool<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> NullPool<V> {
    /// Creates a null pool.
    #[must_use]
    pub fn new() -> Self {
        Self { _phantom: PhantomData }
    }
}

impl<V> ItemPool<V> for NullPool<V> {
    fn get_item(&self, key: &str) -> Result<CacheItem<V>> {
        validate_key(key)?;
        Ok(CacheItem::new(key))
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(false)
    }

    fn clear(&self) -> Result<bool> {
        Ok(true)
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(true)
    }

    fn save(&self, item: CacheItem<V>) -> Result<bool> {
        validate_key(item.key())?;
        Ok(false)
    }

    fn save_deferred(&self, item: CacheItem<V>) -> Result<bool> {
        validate_key(item.key())?;
        Ok(false)
    }

    fn commit(&self) -> Result<bool> {
        Ok(false)
    }
}
