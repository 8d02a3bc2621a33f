// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The item-pool contract implemented by every cache store.

use crate::{CacheItem, Error, Result};

/// Trait for cache stores addressed through cache items.
///
/// All calls are synchronous; a store that talks to a remote service blocks
/// the caller for the duration of the round trip.
///
/// Failures surface in two ways. A store that declines an operation returns
/// `Ok(false)`; a store that cannot reach its backend returns an [`Error`].
/// Neither is retried or swallowed by callers.
///
/// Only `get_items` and `delete_items` have default implementations, which
/// loop over the single-key operations.
pub trait ItemPool<V>: Send + Sync {
    /// Returns the item for `key`, in miss state when absent or expired.
    fn get_item(&self, key: &str) -> Result<CacheItem<V>>;

    /// Returns one item per key, in input order.
    fn get_items(&self, keys: &[&str]) -> Result<Vec<CacheItem<V>>> {
        keys.iter().map(|key| self.get_item(key)).collect()
    }

    /// Returns `true` if the pool holds a live value for `key`.
    fn has_item(&self, key: &str) -> Result<bool>;

    /// Removes every entry of this pool, staged ones included.
    fn clear(&self) -> Result<bool>;

    /// Removes `key`. Removing an absent key succeeds.
    fn delete_item(&self, key: &str) -> Result<bool>;

    /// Removes every key in `keys`.
    ///
    /// Every key is attempted even after a failure. Returns `true` only if all
    /// removals succeeded; the first error, if any, is returned once all keys
    /// have been attempted.
    fn delete_items(&self, keys: &[&str]) -> Result<bool> {
        let mut all_deleted = true;
        let mut first_error: Option<Error> = None;

        for key in keys {
            match self.delete_item(key) {
                Ok(deleted) => all_deleted &= deleted,
                Err(e) => {
                    all_deleted = false;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(all_deleted),
        }
    }

    /// Persists `item` immediately.
    fn save(&self, item: CacheItem<V>) -> Result<bool>;

    /// Stages `item` until the next [`commit`](Self::commit).
    fn save_deferred(&self, item: CacheItem<V>) -> Result<bool>;

    /// Persists every staged item. Returns `true` only if all of them were saved.
    fn commit(&self) -> Result<bool>;
}
