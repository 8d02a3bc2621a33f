// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

use stowage_pool::Expiration;

/// Lifetime used by [`Repository::forever`](crate::Repository::forever): 1000 years.
///
/// Items written with `forever` carry this concrete expiry rather than none,
/// so every store treats them alike.
pub const FOREVER: Duration = Duration::from_secs(1000 * 365 * 24 * 60 * 60);

/// How long a value written through a [`Repository`](crate::Repository) lives.
///
/// Integers are read as seconds: `0` means no expiry of its own (the store's
/// default lifetime applies), positive values expire that many seconds from
/// now. Negative values expire immediately.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use stowage::Ttl;
///
/// assert_eq!(Ttl::from(0_u64), Ttl::None);
/// assert_eq!(Ttl::from(30_u64), Ttl::After(Duration::from_secs(30)));
/// assert_eq!(Ttl::from(SystemTime::UNIX_EPOCH), Ttl::At(SystemTime::UNIX_EPOCH));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ttl {
    /// No expiry of its own.
    #[default]
    None,
    /// Expires this long after the write.
    After(Duration),
    /// Expires at this instant.
    At(SystemTime),
}

impl Ttl {
    pub(crate) fn into_expiration(self) -> Option<Expiration> {
        match self {
            Self::None => None,
            Self::After(after) => Some(Expiration::After(after)),
            Self::At(at) => Some(Expiration::At(at)),
        }
    }
}

impl From<u64> for Ttl {
    fn from(seconds: u64) -> Self {
        if seconds == 0 {
            Self::None
        } else {
            Self::After(Duration::from_secs(seconds))
        }
    }
}

impl From<u32> for Ttl {
    fn from(seconds: u32) -> Self {
        Self::from(u64::from(seconds))
    }
}

impl From<i64> for Ttl {
    fn from(seconds: i64) -> Self {
        match u64::try_from(seconds) {
            Ok(seconds) => Self::from(seconds),
            Err(_) => Self::After(Duration::ZERO),
        }
    }
}

impl From<i32> for Ttl {
    fn from(seconds: i32) -> Self {
        Self::from(i64::from(seconds))
    }
}

impl From<Duration> for Ttl {
    fn from(after: Duration) -> Self {
        Self::After(after)
    }
}

impl From<SystemTime> for Ttl {
    fn from(at: SystemTime) -> Self {
        Self::At(at)
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(after: Option<Duration>) -> Self {
        after.map_or(Self::None, Self::After)
    }
}
