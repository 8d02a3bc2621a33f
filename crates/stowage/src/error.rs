// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use stowage_pool::Error;

/// A store could not be constructed from its configuration.
///
/// Raised by [`CacheManager::driver`](crate::CacheManager::driver) when the
/// configuration names an unknown driver, a missing connection or fallback,
/// a store that is not configured, or a circular reference. The message
/// names the store, and the cause names the offending driver or connection.
///
/// A failed construction leaves the manager unchanged: the store can be
/// requested again once the configuration or connection registry is fixed.
///
/// When the manager is used as a pool directly, the same error is found in
/// the source chain of the returned [`Error`]:
///
/// ```
/// use ohno::ErrorExt;
/// use stowage::{CacheManager, ConfigError, ManagerConfig};
///
/// let manager = CacheManager::<u32>::new(ManagerConfig::new("missing"));
/// let error = manager.get("key").expect_err("store is not configured");
/// assert_eq!(error.find_source::<ConfigError>().map(ConfigError::name), Some("missing"));
/// ```
#[ohno::error]
#[display("cache configuration error for store `{name}`")]
pub struct ConfigError {
    name: String,
}

impl ConfigError {
    pub(crate) fn with_reason(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::caused_by(name, reason.into())
    }

    pub(crate) fn from_pool(name: impl Into<String>, error: Error) -> Self {
        Self::caused_by(name, error)
    }

    /// Returns the name of the store that failed to construct.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Self::from_source(error)
    }
}
