// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use stowage_pool::DynamicPool;
#[cfg(feature = "sql")]
use stowage_stores::SqlConnection;
use stowage_stores::{CacheValue, RedisConnection};
use tick::Clock;

use crate::{CacheManager, ConfigError, Repository, StoreConfig};

/// What a store factory can see while building a store.
///
/// Passed to factories registered with [`CacheManager::extend`] and used by
/// the built-in drivers. Other stores resolved through the context are
/// constructed once and shared with every other user of that name.
///
/// # Examples
///
/// ```
/// use stowage::{CacheManager, ManagerConfig, StoreConfig};
/// use stowage_pool::IntoDynamicPool;
/// use stowage_stores::ChainPool;
///
/// let manager = CacheManager::<u32>::new(
///     ManagerConfig::new("layered")
///         .with_store("near", StoreConfig::new("array").serialize(false))
///         .with_store("far", StoreConfig::new("array")),
/// );
///
/// manager.extend("layered", |ctx| {
///     let pools = vec![ctx.store("near")?, ctx.store("far")?];
///     let chain = ChainPool::new(pools, None).map_err(|e| ctx.error(e))?;
///     Ok(chain.into_dynamic())
/// });
///
/// manager.put("k", 7, 0)?;
/// assert!(manager.driver("far")?.has("k")?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct StoreContext<'a, V> {
    manager: &'a CacheManager<V>,
    name: &'a str,
    config: Option<&'a StoreConfig>,
    stack: &'a mut Vec<String>,
}

impl<'a, V> StoreContext<'a, V> {
    pub(crate) fn new(manager: &'a CacheManager<V>, name: &'a str, config: Option<&'a StoreConfig>, stack: &'a mut Vec<String>) -> Self {
        Self {
            manager,
            name,
            config,
            stack,
        }
    }

    /// Returns the name of the store being built.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the manager's clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        self.manager.clock()
    }

    /// Returns the configuration of the store being built, if it has one.
    #[must_use]
    pub fn config(&self) -> Option<&StoreConfig> {
        self.config
    }

    /// Returns the SQL connection registered under `name`.
    #[cfg(feature = "sql")]
    #[must_use]
    pub fn sql_connection(&self, name: &str) -> Option<SqlConnection> {
        self.manager.sql_connection(name)
    }

    /// Returns the Redis connection registered under `name`.
    #[must_use]
    pub fn redis_connection(&self, name: &str) -> Option<RedisConnection> {
        self.manager.redis_connection(name)
    }

    /// Creates a configuration error for the store being built.
    pub fn error(&self, reason: impl std::fmt::Display) -> ConfigError {
        ConfigError::with_reason(self.name, reason.to_string())
    }
}

impl<V> StoreContext<'_, V>
where
    V: CacheValue,
{
    /// Resolves another store and returns its pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be built, or if it depends on
    /// the store currently being built.
    pub fn store(&mut self, name: &str) -> Result<DynamicPool<V>, ConfigError> {
        self.repository(name).map(|repository| repository.pool().clone())
    }

    /// Resolves another store and returns its repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be built, or if it depends on
    /// the store currently being built.
    pub fn repository(&mut self, name: &str) -> Result<Repository<V>, ConfigError> {
        self.manager.resolve(name, self.stack)
    }
}
