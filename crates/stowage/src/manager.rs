// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Named stores built on demand.

use std::{collections::HashMap, marker::PhantomData, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use stowage_pool::{CacheItem, DynamicPool, Error, ItemPool, Result};
#[cfg(feature = "sql")]
use stowage_stores::SqlConnection;
use stowage_stores::{CacheValue, RedisConnection};
use tick::Clock;

#[cfg(any(feature = "metrics", test))]
use crate::telemetry::metrics::Instruments;
use crate::{
    ConfigError, ManagerConfig, Repository, StoreConfig, StoreContext, Ttl,
    drivers::{self, Built},
    telemetry::Telemetry,
};

type Factory<V> = Arc<dyn Fn(&mut StoreContext<'_, V>) -> std::result::Result<DynamicPool<V>, ConfigError> + Send + Sync>;

/// Builds and hands out named cache stores.
///
/// Each store is described by a [`StoreConfig`] and built the first time it
/// is requested; afterwards every request for that name returns the same
/// store, including from concurrent callers. Stores that are built from other
/// stores (`chain`, `phparray`) share those instances.
///
/// The manager is itself a pool and a [`Repository`]-like facade over its
/// default store: every [`ItemPool`] method and every convenience method
/// forwards there. If the default store cannot be built, the
/// [`ConfigError`] is found in the returned error's source chain.
///
/// # Examples
///
/// ```
/// use stowage::{CacheManager, ManagerConfig, StoreConfig};
///
/// let manager = CacheManager::<String>::new(
///     ManagerConfig::new("local")
///         .with_store("local", StoreConfig::new("array").lifetime(300))
///         .with_store("void", StoreConfig::new("null")),
/// );
///
/// manager.put("user:1", "ada".to_string(), 0)?;
/// assert_eq!(manager.get("user:1")?.as_deref(), Some("ada"));
///
/// let void = manager.driver("void")?;
/// assert!(void.put("user:1", "ada".to_string(), 0).is_ok());
/// assert!(!void.has("user:1")?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CacheManager<V> {
    config: ManagerConfig,
    clock: Clock,
    telemetry: Telemetry,
    factories: RwLock<HashMap<String, Factory<V>>>,
    resolved: Mutex<HashMap<String, Arc<OnceCell<Repository<V>>>>>,
    #[cfg(feature = "sql")]
    sql_connections: RwLock<HashMap<String, SqlConnection>>,
    redis_connections: RwLock<HashMap<String, RedisConnection>>,
}

impl<V> std::fmt::Debug for CacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .field("custom_stores", &self.factories.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<V> CacheManager<V> {
    /// Creates a manager with the system clock and telemetry disabled.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self::builder(config).build()
    }

    /// Starts configuring a manager.
    #[must_use]
    pub fn builder(config: ManagerConfig) -> CacheManagerBuilder<V> {
        CacheManagerBuilder::new(config)
    }

    /// Returns the configuration the manager was created with.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the name of the default store.
    #[must_use]
    pub fn default_driver(&self) -> &str {
        &self.config.store
    }

    /// Returns the clock shared by every store.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Registers a factory for the store `name`.
    ///
    /// The factory takes precedence over any configuration under that name.
    /// A store already built under `name` is discarded, and the next request
    /// runs the factory.
    pub fn extend<F>(&self, name: impl Into<String>, factory: F) -> &Self
    where
        F: Fn(&mut StoreContext<'_, V>) -> std::result::Result<DynamicPool<V>, ConfigError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.resolved.lock().remove(&name);
        tracing::debug!(cache.store = name.as_str(), "custom store factory registered");
        self.factories.write().insert(name, Arc::new(factory));
        self
    }

    /// Registers the SQL connection `pdo` stores refer to by `name`.
    #[cfg(feature = "sql")]
    pub fn set_pdo_connection(&self, name: impl Into<String>, connection: SqlConnection) -> &Self {
        self.sql_connections.write().insert(name.into(), connection);
        self
    }

    /// Registers the Redis connection `redis` stores refer to by `name`.
    ///
    /// # Errors
    ///
    /// Returns an error for a sharded connection without servers.
    pub fn set_redis_connection(&self, name: impl Into<String>, connection: RedisConnection) -> std::result::Result<&Self, ConfigError> {
        let name = name.into();
        #[cfg(feature = "redis")]
        if matches!(&connection, RedisConnection::Sharded(clients) if clients.is_empty()) {
            return Err(ConfigError::with_reason(
                name,
                "a sharded redis connection needs at least one server",
            ));
        }

        self.redis_connections.write().insert(name, connection);
        Ok(self)
    }

    #[cfg(feature = "sql")]
    pub(crate) fn sql_connection(&self, name: &str) -> Option<SqlConnection> {
        self.sql_connections.read().get(name).cloned()
    }

    pub(crate) fn redis_connection(&self, name: &str) -> Option<RedisConnection> {
        self.redis_connections.read().get(name).cloned()
    }

    /// Finds a cycle among configured dependencies reachable from `path`'s last store.
    fn find_cycle<'c>(&'c self, config: &'c StoreConfig, path: &mut Vec<&'c str>) -> Option<String> {
        for dependency in config.dependencies() {
            if let Some(start) = path.iter().position(|name| *name == dependency) {
                let mut cycle = path[start..].to_vec();
                cycle.push(dependency);
                return Some(cycle.join(" -> "));
            }

            // Custom stores declare their dependencies only when they run.
            if self.factories.read().contains_key(dependency) {
                continue;
            }
            let Some(next) = self.config.stores.get(dependency) else {
                continue;
            };

            path.push(dependency);
            if let Some(cycle) = self.find_cycle(next, path) {
                return Some(cycle);
            }
            path.pop();
        }
        None
    }

    fn check_cycles(&self, name: &str, config: &StoreConfig) -> std::result::Result<(), ConfigError> {
        match self.find_cycle(config, &mut vec![name]) {
            Some(cycle) => Err(ConfigError::with_reason(name, format!("circular store reference: {cycle}"))),
            None => Ok(()),
        }
    }
}

impl<V> CacheManager<V>
where
    V: CacheValue,
{
    /// Returns the store `name`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is neither configured nor registered with
    /// [`extend`](Self::extend), or if its configuration is invalid. A failed
    /// store is not remembered; a later call tries again.
    pub fn driver(&self, name: &str) -> std::result::Result<Repository<V>, ConfigError> {
        self.resolve(name, &mut Vec::new())
    }

    /// Returns the store `name`, or the default store for `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be built.
    pub fn store(&self, name: Option<&str>) -> std::result::Result<Repository<V>, ConfigError> {
        self.driver(name.unwrap_or(&self.config.store))
    }

    /// Builds a store from `config` without registering it.
    ///
    /// Every call returns a new store. Stores it depends on are still
    /// resolved through the manager and shared.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn create_store(&self, name: &str, config: &StoreConfig) -> std::result::Result<Repository<V>, ConfigError> {
        self.check_cycles(name, config)?;
        let mut stack = Vec::new();
        let built = drivers::build(&mut StoreContext::new(self, name, Some(config), &mut stack), config)?;
        Ok(self.repository(name, built))
    }

    pub(crate) fn resolve(&self, name: &str, stack: &mut Vec<String>) -> std::result::Result<Repository<V>, ConfigError> {
        if stack.iter().any(|pending| pending == name) {
            let mut cycle = stack.clone();
            cycle.push(name.to_owned());
            return Err(ConfigError::with_reason(
                name,
                format!("circular store reference: {}", cycle.join(" -> ")),
            ));
        }

        // The map lock only guards the lookup. Construction runs inside the per-name cell.
        let cell = Arc::clone(self.resolved.lock().entry(name.to_owned()).or_default());
        if let Some(repository) = cell.get() {
            return Ok(repository.clone());
        }

        stack.push(name.to_owned());
        let result = cell.get_or_try_init(|| self.construct(name, stack)).cloned();
        stack.pop();
        result
    }

    fn construct(&self, name: &str, stack: &mut Vec<String>) -> std::result::Result<Repository<V>, ConfigError> {
        let factory = self.factories.read().get(name).cloned();
        let config = self.config.stores.get(name);
        let driver = match (&factory, config) {
            (Some(_), _) => "custom",
            (None, Some(config)) => config.driver.as_str(),
            (None, None) => "none",
        };

        let result = match factory {
            Some(factory) => factory(&mut StoreContext::new(self, name, config, stack)).map(Built::from),
            None => match config {
                Some(config) => self
                    .check_cycles(name, config)
                    .and_then(|()| drivers::build(&mut StoreContext::new(self, name, Some(config), stack), config)),
                None => Err(ConfigError::with_reason(name, format!("store `{name}` is not defined"))),
            },
        };

        match result {
            Ok(built) => {
                tracing::debug!(cache.store = name, cache.driver = driver, "cache store created");
                Ok(self.repository(name, built))
            }
            Err(e) => {
                tracing::warn!(cache.store = name, cache.driver = driver, error = %e, "cache store creation failed");
                Err(e)
            }
        }
    }

    fn repository(&self, name: &str, built: Built<V>) -> Repository<V> {
        Repository::with_telemetry(name, built.pool, self.clock.clone(), self.telemetry.clone()).with_snapshot(built.snapshot)
    }

    fn default_store(&self) -> Result<Repository<V>> {
        Ok(self.driver(&self.config.store)?)
    }

    /// Returns the live value for `key` in the default store.
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        self.default_store()?.get(key)
    }

    /// Returns the value for `key` in the default store, or `default`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn get_or(&self, key: &str, default: V) -> Result<V> {
        self.default_store()?.get_or(key, default)
    }

    /// Reports whether the default store holds a live value for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn has(&self, key: &str) -> Result<bool> {
        self.default_store()?.has(key)
    }

    /// See [`Repository::remember`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn remember(&self, key: &str, ttl: impl Into<Ttl>, producer: impl FnOnce() -> V) -> Result<V> {
        self.default_store()?.remember(key, ttl, producer)
    }

    /// See [`Repository::try_remember`].
    ///
    /// # Errors
    ///
    /// Returns the producer's error, or a store error converted into `E`.
    pub fn try_remember<E>(
        &self,
        key: &str,
        ttl: impl Into<Ttl>,
        producer: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E>
    where
        E: From<Error>,
    {
        self.default_store().map_err(E::from)?.try_remember(key, ttl, producer)
    }

    /// See [`Repository::pull`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn pull(&self, key: &str) -> Result<Option<V>> {
        self.default_store()?.pull(key)
    }

    /// See [`Repository::put`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn put(&self, key: &str, value: V, ttl: impl Into<Ttl>) -> Result<bool> {
        self.default_store()?.put(key, value, ttl)
    }

    /// See [`Repository::add`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn add(&self, key: &str, value: V, ttl: impl Into<Ttl>) -> Result<bool> {
        self.default_store()?.add(key, value, ttl)
    }

    /// See [`Repository::defer`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn defer(&self, key: &str, value: V, ttl: impl Into<Ttl>) -> Result<bool> {
        self.default_store()?.defer(key, value, ttl)
    }

    /// See [`Repository::forever`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn forever(&self, key: &str, value: V) -> Result<bool> {
        self.default_store()?.forever(key, value)
    }

    /// See [`Repository::forget`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or fails.
    pub fn forget(&self, key: &str) -> Result<bool> {
        self.default_store()?.forget(key)
    }

    /// See [`Repository::warm_up`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default store cannot be built or is not a
    /// `phparray` store, or if writing the snapshot fails.
    pub fn warm_up(&self, values: HashMap<String, V>) -> Result<()> {
        self.default_store()?.warm_up(values)
    }
}

impl<V> ItemPool<V> for CacheManager<V>
where
    V: CacheValue,
{
    fn get_item(&self, key: &str) -> Result<CacheItem<V>> {
        self.default_store()?.get_item(key)
    }

    fn get_items(&self, keys: &[&str]) -> Result<Vec<CacheItem<V>>> {
        self.default_store()?.get_items(keys)
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        self.default_store()?.has_item(key)
    }

    fn clear(&self) -> Result<bool> {
        self.default_store()?.clear()
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        self.default_store()?.delete_item(key)
    }

    fn delete_items(&self, keys: &[&str]) -> Result<bool> {
        self.default_store()?.delete_items(keys)
    }

    fn save(&self, item: CacheItem<V>) -> Result<bool> {
        self.default_store()?.save(item)
    }

    fn save_deferred(&self, item: CacheItem<V>) -> Result<bool> {
        self.default_store()?.save_deferred(item)
    }

    fn commit(&self) -> Result<bool> {
        self.default_store()?.commit()
    }
}

/// Configures a [`CacheManager`].
///
/// # Examples
///
/// ```
/// use stowage::{CacheManager, ManagerConfig, StoreConfig};
/// use tick::Clock;
///
/// let manager = CacheManager::<u64>::builder(
///     ManagerConfig::new("local").with_store("local", StoreConfig::new("array")),
/// )
/// .clock(Clock::new_frozen())
/// .logs()
/// .build();
///
/// assert!(manager.put("hits", 1, 60)?);
/// # Ok::<(), stowage_pool::Error>(())
/// ```
pub struct CacheManagerBuilder<V> {
    config: ManagerConfig,
    clock: Option<Clock>,
    logs: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<Instruments>,
    _value: PhantomData<fn() -> V>,
}

impl<V> std::fmt::Debug for CacheManagerBuilder<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManagerBuilder")
            .field("config", &self.config)
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

impl<V> CacheManagerBuilder<V> {
    fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            clock: None,
            logs: false,
            #[cfg(any(feature = "metrics", test))]
            instruments: None,
            _value: PhantomData,
        }
    }

    /// Uses `clock` for expiry and timing instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Emits a `tracing` event for every cache operation.
    #[must_use]
    pub fn logs(mut self) -> Self {
        self.logs = true;
        self
    }

    /// Records operation counts and durations with `meter_provider`.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(mut self, meter_provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.instruments = Some(Instruments::new(meter_provider));
        self
    }

    #[cfg(test)]
    pub(crate) fn instruments(mut self, instruments: Instruments) -> Self {
        self.instruments = Some(instruments);
        self
    }

    /// Creates the manager. No store is built until first requested.
    #[must_use]
    pub fn build(self) -> CacheManager<V> {
        #[cfg(any(feature = "metrics", test))]
        let telemetry = Telemetry::new(self.logs, self.instruments);
        #[cfg(not(any(feature = "metrics", test)))]
        let telemetry = Telemetry::new(self.logs);

        CacheManager {
            config: self.config,
            clock: self
                .clock
                .unwrap_or_else(|| tick::runtime::InactiveClock::default().activate().0),
            telemetry,
            factories: RwLock::default(),
            resolved: Mutex::default(),
            #[cfg(feature = "sql")]
            sql_connections: RwLock::default(),
            redis_connections: RwLock::default(),
        }
    }
}
