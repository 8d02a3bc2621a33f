// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Built-in drivers.

use std::{path::PathBuf, sync::Arc, time::Duration};

use stowage_pool::{DynamicPool, IntoDynamicPool, ItemPool};
#[cfg(feature = "sql")]
use stowage_stores::SqlBackend;
use stowage_stores::{
    Backend, CacheValue, ChainPool, CompiledFilesBackend, DEFAULT_DIRECTORY, FilesystemBackend, MemoryBackend, NullPool,
    RedisBackend, SharedMemoryBackend, SnapshotPool, StorePool,
};

use crate::{ConfigError, Driver, StoreConfig, StoreContext};

/// A built store, with its snapshot handle when it is a `phparray` store.
pub(crate) struct Built<V> {
    pub(crate) pool: DynamicPool<V>,
    pub(crate) snapshot: Option<Arc<SnapshotPool<V>>>,
}

impl<V> From<DynamicPool<V>> for Built<V> {
    fn from(pool: DynamicPool<V>) -> Self {
        Self { pool, snapshot: None }
    }
}

/// Builds the store for one configuration.
pub(crate) fn build<V>(ctx: &mut StoreContext<'_, V>, config: &StoreConfig) -> Result<Built<V>, ConfigError>
where
    V: CacheValue,
{
    let name = ctx.name().to_owned();
    let pool_error = |e: stowage_pool::Error| ConfigError::from_pool(name.as_str(), e);

    let pool = match &config.driver {
        Driver::Array => store(ctx, config, MemoryBackend::new(config.serialize)),
        Driver::Null => NullPool::new().into_dynamic(),
        Driver::File => {
            let backend = FilesystemBackend::new(config.path.as_deref(), &config.namespace).map_err(pool_error)?;
            store(ctx, config, backend)
        }
        Driver::PhpFiles => {
            let backend = CompiledFilesBackend::new(config.path.as_deref(), &config.namespace).map_err(pool_error)?;
            store(ctx, config, backend)
        }
        Driver::Apcu => {
            let backend = SharedMemoryBackend::new(&config.namespace, config.version.as_deref()).map_err(pool_error)?;
            store(ctx, config, backend)
        }
        Driver::PhpArray => return snapshot(ctx, config),
        Driver::Pdo => pdo(ctx, config)?,
        Driver::Redis => {
            let connection_name = connection_name(ctx, config)?;
            let connection = ctx
                .redis_connection(connection_name)
                .ok_or_else(|| ctx.error(format!("connection `{connection_name}` is not a registered redis connection")))?;
            let backend = RedisBackend::new(connection, &config.namespace).map_err(pool_error)?;
            store(ctx, config, backend)
        }
        Driver::Chain => {
            if config.stores.is_empty() {
                return Err(ctx.error("the `chain` driver needs at least one store in `stores`"));
            }
            let pools = config
                .stores
                .iter()
                .map(|member| ctx.store(member))
                .collect::<Result<Vec<_>, _>>()?;
            ChainPool::new(pools, Some(Duration::from_secs(config.lifetime)))
                .map_err(pool_error)?
                .into_dynamic()
        }
        Driver::Unknown(driver) => return Err(ctx.error(format!("cannot create `{driver}` driver via the internal mechanisms"))),
    };

    Ok(pool.into())
}

fn snapshot<V>(ctx: &mut StoreContext<'_, V>, config: &StoreConfig) -> Result<Built<V>, ConfigError>
where
    V: CacheValue,
{
    let fallback = config
        .fallback
        .as_deref()
        .ok_or_else(|| ctx.error("the `phparray` driver needs a `fallback` store"))?;
    let fallback = ctx.store(fallback)?;
    let path = config.path.clone().unwrap_or_else(|| snapshot_path(ctx.name()));

    let snapshot = Arc::new(SnapshotPool::new(path, fallback));
    let erased: Arc<dyn ItemPool<V>> = Arc::<SnapshotPool<V>>::clone(&snapshot);
    Ok(Built {
        pool: erased.into(),
        snapshot: Some(snapshot),
    })
}

#[cfg(feature = "sql")]
fn pdo<V>(ctx: &StoreContext<'_, V>, config: &StoreConfig) -> Result<DynamicPool<V>, ConfigError>
where
    V: CacheValue,
{
    let connection_name = connection_name(ctx, config)?;
    let connection = ctx
        .sql_connection(connection_name)
        .ok_or_else(|| ctx.error(format!("connection `{connection_name}` is not a registered pdo connection")))?;
    let backend = SqlBackend::new(connection, &config.namespace, config.options.clone(), ctx.clock().clone())
        .map_err(|e| ConfigError::from_pool(ctx.name(), e))?;
    Ok(store(ctx, config, backend))
}

#[cfg(not(feature = "sql"))]
fn pdo<V>(ctx: &StoreContext<'_, V>, _config: &StoreConfig) -> Result<DynamicPool<V>, ConfigError>
where
    V: CacheValue,
{
    Err(ctx.error("the `pdo` driver is disabled; enable the `sql` feature"))
}

fn connection_name<'c, V>(ctx: &StoreContext<'_, V>, config: &'c StoreConfig) -> Result<&'c str, ConfigError> {
    config
        .connection
        .as_deref()
        .ok_or_else(|| ctx.error(format!("the `{}` driver needs a `connection`", config.driver)))
}

fn store<B, V>(ctx: &StoreContext<'_, V>, config: &StoreConfig, backend: B) -> DynamicPool<V>
where
    B: Backend<V> + 'static,
    V: CacheValue,
{
    StorePool::new(backend, ctx.clock().clone())
        .default_lifetime(Some(Duration::from_secs(config.lifetime)))
        .into_dynamic()
}

fn snapshot_path(store: &str) -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DIRECTORY).join(format!("{store}.snapshot"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_path_is_per_store() {
        let path = snapshot_path("routes");
        assert!(path.ends_with("stowage/routes.snapshot"), "got: {}", path.display());
    }
}
