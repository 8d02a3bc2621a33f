// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for stores composed from other stores.

use std::{collections::HashMap, time::Duration};

use stowage_pool::{CacheItem, Error, IntoDynamicPool, ItemPool};
use stowage_stores::{ChainPool, MemoryBackend, NullPool, SharedMemoryBackend, SnapshotPool, StorePool};
use tick::{Clock, ClockControl};

type TestResult = Result<(), Error>;

#[test]
fn chain_back_fill_expires_with_chain_lifetime() -> TestResult {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let near = StorePool::new(MemoryBackend::<u32>::new(true), clock.clone()).into_dynamic();
    let far = StorePool::new(MemoryBackend::<u32>::new(true), clock).into_dynamic();
    far.save(CacheItem::hit("k", 1))?;

    let chain = ChainPool::new(vec![near.clone(), far.clone()], Some(Duration::from_secs(10)))?;
    assert_eq!(chain.get_item("k")?.get(), Some(&1));
    assert!(near.has_item("k")?);

    control.advance(Duration::from_secs(10));
    assert!(!near.has_item("k")?, "copy expired with the chain lifetime");
    assert!(far.has_item("k")?, "original has no expiry");
    Ok(())
}

#[test]
fn chain_with_null_member_reports_partial_writes() -> TestResult {
    let memory = StorePool::new(MemoryBackend::<u32>::new(true), Clock::new_frozen()).into_dynamic();
    let chain = ChainPool::new(vec![memory.clone(), NullPool::new().into_dynamic()], None)?;

    assert!(!chain.save(CacheItem::hit("k", 1))?, "null store never saves");
    assert!(memory.has_item("k")?, "other stores still receive the write");
    assert!(chain.delete_item("k")?);
    Ok(())
}

#[test]
fn snapshot_over_shared_memory_fallback() -> TestResult {
    let dir = tempfile::tempdir().map_err(Error::from_source)?;
    let fallback = StorePool::new(SharedMemoryBackend::<String>::new("composite-snapshot", None)?, Clock::new_frozen());
    let pool = SnapshotPool::new(dir.path().join("app.snapshot"), fallback.into_dynamic());

    pool.warm_up(HashMap::from([("config".to_owned(), "frozen".to_owned())]))?;
    pool.save(CacheItem::hit("session", "live".to_owned()))?;

    let items = pool.get_items(&["config", "session", "missing"])?;
    let values: Vec<_> = items.iter().map(|item| item.get().cloned()).collect();
    assert_eq!(values, vec![Some("frozen".to_owned()), Some("live".to_owned()), None]);

    assert!(!pool.delete_item("config")?);
    assert!(pool.delete_item("session")?);
    Ok(())
}

#[test]
fn deferred_saves_in_a_chain_are_visible_after_commit() -> TestResult {
    let clock = Clock::new_frozen();
    let near = StorePool::new(MemoryBackend::<u32>::new(false), clock.clone()).into_dynamic();
    let far = StorePool::new(MemoryBackend::<u32>::new(true), clock).into_dynamic();
    let chain = ChainPool::new(vec![near, far.clone()], None)?;

    assert!(chain.save_deferred(CacheItem::hit("k", 3))?);
    assert!(chain.commit()?);
    assert_eq!(far.get_item("k")?.get(), Some(&3));
    Ok(())
}
