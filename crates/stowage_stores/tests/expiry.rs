// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for reclaiming expired records.

use std::time::Duration;

use stowage_pool::{CacheItem, Error, ItemPool};
use stowage_stores::{MemoryBackend, PRUNE_INTERVAL, SharedMemoryBackend, StorePool};
use tick::ClockControl;

type TestResult = Result<(), Error>;

fn expiring(key: String, value: u32) -> CacheItem<u32> {
    let mut item = CacheItem::new(key);
    item.set(value).expires_after(Some(Duration::from_secs(1)));
    item
}

#[test]
fn reading_expired_records_removes_them() -> TestResult {
    let control = ClockControl::new();
    let pool = StorePool::new(MemoryBackend::<u32>::new(true), control.to_clock());

    for i in 0..1_000 {
        pool.save(expiring(format!("k{i}"), i))?;
    }
    control.advance(Duration::from_secs(3_600));

    for i in 0..1_000 {
        assert!(!pool.get_item(&format!("k{i}"))?.is_hit());
    }
    assert_eq!(pool.backend().entry_count(), 0);
    Ok(())
}

#[test]
fn prune_reclaims_unread_records() -> TestResult {
    let control = ClockControl::new();
    let pool = StorePool::new(MemoryBackend::<u32>::new(false), control.to_clock());

    pool.save(expiring("short".to_owned(), 1))?;
    pool.save(CacheItem::hit("long", 2))?;
    control.advance(Duration::from_secs(1));

    assert_eq!(pool.prune()?, 1);
    assert_eq!(pool.backend().entry_count(), 1);
    assert!(pool.has_item("long")?);
    Ok(())
}

#[test]
fn writes_sweep_expired_records_from_shared_segments() -> TestResult {
    let control = ClockControl::new();
    let pool = StorePool::new(SharedMemoryBackend::<u32>::new("expiry-write-sweep", None)?, control.to_clock());

    for i in 0..10 {
        pool.save(expiring(format!("old{i}"), i))?;
    }
    control.advance(Duration::from_secs(3_600));

    let fresh = PRUNE_INTERVAL - 10;
    for i in 0..fresh {
        pool.save(CacheItem::hit(format!("new{i}"), 0))?;
    }

    let expected = usize::try_from(fresh).map_err(Error::from_source)?;
    assert_eq!(pool.backend().entry_count(), expected);
    Ok(())
}
