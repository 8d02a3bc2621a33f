// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Raw storage contract underneath [`StorePool`](crate::StorePool).

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use stowage_pool::Result;

/// What a backend persists for one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<V> {
    /// The cached value.
    pub value: V,
    /// Absolute expiry; `None` never expires.
    pub expires_at: Option<SystemTime>,
}

impl<V> Record<V> {
    /// Creates a record.
    pub fn new(value: V, expires_at: Option<SystemTime>) -> Self {
        Self { value, expires_at }
    }

    /// Returns `true` if the record is past its expiry at `now`.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Storage operations a [`StorePool`](crate::StorePool) builds on.
///
/// Keys reaching a backend are already validated. Backends do not check
/// expiry themselves; they may use the `ttl` hint passed to
/// [`store`](Self::store) to let the underlying storage evict on its own.
/// Backends without native eviction implement [`prune`](Self::prune).
pub trait Backend<V>: Send + Sync {
    /// Reads the record for `key`.
    fn fetch(&self, key: &str) -> Result<Option<Record<V>>>;

    /// Writes the record for `key`. `ttl` is the remaining lifetime, if any.
    fn store(&self, key: &str, record: Record<V>, ttl: Option<Duration>) -> Result<bool>;

    /// Removes `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Removes every record owned by this backend.
    fn purge(&self) -> Result<bool>;

    /// Removes records that expired at or before `now` and returns how many.
    ///
    /// The default does nothing, for backends whose storage evicts on its own
    /// or that hold nothing worth reclaiming.
    fn prune(&self, now: SystemTime) -> Result<usize> {
        let _ = now;
        Ok(0)
    }
}
