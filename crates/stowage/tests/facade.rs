// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the convenience operations, through the manager.

use std::{
    cell::Cell,
    time::{Duration, SystemTime},
};

use stowage::{CacheManager, Error, FOREVER, ItemPool, ManagerConfig, StoreConfig};
use tick::ClockControl;

type TestResult = Result<(), Error>;

fn manager(driver: &str, control: &ClockControl) -> CacheManager<String> {
    CacheManager::builder(ManagerConfig::new("main").with_store("main", StoreConfig::new(driver)))
        .clock(control.to_clock())
        .build()
}

#[test]
fn absent_keys_are_misses() -> TestResult {
    let cache = manager("array", &ClockControl::new());

    assert!(!cache.has("never")?);
    assert_eq!(cache.get("never")?, None);
    assert_eq!(cache.get_or("never", "fallback".to_owned())?, "fallback");
    Ok(())
}

#[test]
fn put_without_ttl_does_not_expire() -> TestResult {
    let control = ClockControl::new();
    let cache = manager("array", &control);

    assert!(cache.put("k", "v".to_owned(), 0)?);
    control.advance(Duration::from_secs(365 * 24 * 3600));
    assert!(cache.has("k")?);
    assert_eq!(cache.get("k")?.as_deref(), Some("v"));
    Ok(())
}

#[test]
fn second_add_is_a_no_op() -> TestResult {
    let cache = manager("array", &ClockControl::new());

    assert!(cache.add("k", "first".to_owned(), 0)?);
    assert!(!cache.add("k", "second".to_owned(), 0)?);
    assert_eq!(cache.get("k")?.as_deref(), Some("first"));
    Ok(())
}

#[test]
fn pull_returns_and_removes() -> TestResult {
    let cache = manager("array", &ClockControl::new());
    cache.put("k", "v".to_owned(), 0)?;

    assert_eq!(cache.pull("k")?.as_deref(), Some("v"));
    assert!(!cache.has("k")?);
    assert_eq!(cache.pull("k")?, None);
    Ok(())
}

#[test]
fn remember_runs_the_first_producer_only() -> TestResult {
    let cache = manager("array", &ClockControl::new());
    let calls = Cell::new(0);

    let first = cache.remember("k", 60, || {
        calls.set(calls.get() + 1);
        "first".to_owned()
    })?;
    let second = cache.remember("k", 60, || {
        calls.set(calls.get() + 1);
        "second".to_owned()
    })?;

    assert_eq!(first, "first");
    assert_eq!(second, "first");
    assert_eq!(calls.get(), 1);
    Ok(())
}

#[test]
fn try_remember_failure_caches_nothing() -> TestResult {
    let cache = manager("array", &ClockControl::new());

    let result: Result<String, Error> = cache.try_remember("k", 60, || Err(Error::from_message("backend down")));
    result.expect_err("producer failed");
    assert!(!cache.has("k")?);

    let value = cache.try_remember::<Error>("k", 60, || Ok("ok".to_owned()))?;
    assert_eq!(value, "ok");
    assert!(cache.has("k")?);
    Ok(())
}

#[test]
fn relative_ttl_expires() -> TestResult {
    let control = ClockControl::new();
    let cache = manager("array", &control);

    cache.put("k", "v".to_owned(), 1)?;
    assert!(cache.has("k")?);

    control.advance(Duration::from_secs(1));
    assert!(!cache.has("k")?);
    assert_eq!(cache.get_or("k", "gone".to_owned())?, "gone");
    Ok(())
}

#[test]
fn absolute_ttl_expires() -> TestResult {
    let control = ClockControl::new();
    let cache = manager("array", &control);
    let now: SystemTime = control.to_clock().system_time();

    cache.put("k", "v".to_owned(), now + Duration::from_secs(5))?;
    control.advance(Duration::from_secs(4));
    assert!(cache.has("k")?);
    control.advance(Duration::from_secs(1));
    assert!(!cache.has("k")?);
    Ok(())
}

#[test]
fn negative_ttl_removes_the_key() -> TestResult {
    let cache = manager("array", &ClockControl::new());
    cache.put("k", "v".to_owned(), 0)?;

    cache.put("k", "w".to_owned(), -1)?;
    assert!(!cache.has("k")?);
    Ok(())
}

#[test]
fn forever_outlives_short_ttls() -> TestResult {
    let control = ClockControl::new();
    let cache = manager("array", &control);

    cache.forever("k", "v".to_owned())?;
    cache.put("short", "v".to_owned(), 10)?;
    assert!(cache.has("k")?);

    control.advance(Duration::from_secs(10 * 365 * 24 * 3600));
    assert!(!cache.has("short")?);
    assert!(cache.has("k")?);

    control.advance(FOREVER);
    assert!(!cache.has("k")?);
    Ok(())
}

#[test]
fn clear_removes_every_key() -> TestResult {
    let cache = manager("array", &ClockControl::new());
    for key in ["a", "b", "c"] {
        cache.put(key, key.to_owned(), 0)?;
    }

    assert!(cache.clear()?);
    for key in ["a", "b", "c"] {
        assert!(!cache.has(key)?, "{key} survived clear");
    }
    Ok(())
}

#[test]
fn deferred_values_are_visible_before_commit() -> TestResult {
    let cache = manager("array", &ClockControl::new());
    let store = cache.driver("main")?;

    assert!(cache.defer("k", "v".to_owned(), 0)?);
    assert!(cache.has("k")?);
    assert!(cache.commit()?);
    assert_eq!(store.get("k")?.as_deref(), Some("v"));
    assert!(cache.forget("k")?);
    Ok(())
}

#[test]
fn forget_on_absent_key_succeeds() -> TestResult {
    let cache = manager("array", &ClockControl::new());
    assert!(cache.forget("never")?);
    Ok(())
}

#[test]
fn invalid_keys_are_rejected() {
    let cache = manager("array", &ClockControl::new());
    cache.put("a{b}", "v".to_owned(), 0).expect_err("reserved characters");
    cache.get("").expect_err("empty key");
}

#[test]
fn null_store_never_holds_values() -> TestResult {
    let cache = manager("null", &ClockControl::new());

    assert!(!cache.put("k", "v".to_owned(), 0)?);
    assert!(!cache.has("k")?);
    assert_eq!(cache.remember("k", 0, || "made".to_owned())?, "made");
    assert!(!cache.has("k")?);
    Ok(())
}
