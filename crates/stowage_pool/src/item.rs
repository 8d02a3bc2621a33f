// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

/// When a saved item stops being visible.
///
/// Relative expirations are resolved against the store clock when the item
/// is saved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiration {
    /// The item expires at the given instant.
    At(SystemTime),
    /// The item expires once the duration has elapsed after saving.
    After(Duration),
}

impl Expiration {
    /// Resolves this expiration to an absolute deadline.
    ///
    /// Returns `None` when the deadline cannot be represented, which callers
    /// treat as "never expires".
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, SystemTime};
    ///
    /// use stowage_pool::Expiration;
    ///
    /// let now = SystemTime::UNIX_EPOCH;
    /// let deadline = Expiration::After(Duration::from_secs(5)).deadline(now);
    /// assert_eq!(deadline, Some(now + Duration::from_secs(5)));
    /// ```
    #[must_use]
    pub fn deadline(self, now: SystemTime) -> Option<SystemTime> {
        match self {
            Self::At(at) => Some(at),
            Self::After(after) => now.checked_add(after),
        }
    }
}

/// A single cache entry as seen by callers of an [`ItemPool`](crate::ItemPool).
///
/// `CacheItem` carries the key, an optional value, whether the value came
/// from the store (a hit), and an optional expiration. An item without an
/// expiration picks up the store's default lifetime when saved.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use stowage_pool::CacheItem;
///
/// // Miss-state item, as returned for an absent key
/// let mut item = CacheItem::<i32>::new("answer");
/// assert!(!item.is_hit());
/// assert_eq!(item.get(), None);
///
/// // Assign a value and a relative expiration before saving
/// item.set(42).expires_after(Some(Duration::from_secs(60)));
/// assert_eq!(item.get(), Some(&42));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheItem<V> {
    key: String,
    value: Option<V>,
    hit: bool,
    expiration: Option<Expiration>,
}

impl<V> CacheItem<V> {
    /// Creates a miss-state item for the given key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            hit: false,
            expiration: None,
        }
    }

    /// Creates a hit-state item holding a value read from a store.
    ///
    /// Stores call this when a live value is found for `key`.
    pub fn hit(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
            hit: true,
            expiration: None,
        }
    }

    /// Returns the key of this item.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the value held by this item, if any.
    ///
    /// A miss-state item holds a value only after [`set`](Self::set).
    #[must_use]
    pub fn get(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Returns `true` if this item was read from the store with a live value.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.hit
    }

    /// Returns the expiration assigned to this item.
    #[must_use]
    pub fn expiration(&self) -> Option<Expiration> {
        self.expiration
    }

    /// Sets the value to save.
    pub fn set(&mut self, value: V) -> &mut Self {
        self.value = Some(value);
        self
    }

    /// Sets an absolute expiration, or clears it with `None`.
    pub fn expires_at(&mut self, at: Option<SystemTime>) -> &mut Self {
        self.expiration = at.map(Expiration::At);
        self
    }

    /// Sets a relative expiration, or clears it with `None`.
    pub fn expires_after(&mut self, after: Option<Duration>) -> &mut Self {
        self.expiration = after.map(Expiration::After);
        self
    }

    /// Replaces the expiration with an already built [`Expiration`].
    pub fn set_expiration(&mut self, expiration: Option<Expiration>) -> &mut Self {
        self.expiration = expiration;
        self
    }

    /// Consumes the item and returns its value.
    #[must_use]
    pub fn into_value(self) -> Option<V> {
        self.value
    }

    /// Consumes the item and returns its key, value and expiration.
    #[must_use]
    pub fn into_parts(self) -> (String, Option<V>, Option<Expiration>) {
        (self.key, self.value, self.expiration)
    }
}
