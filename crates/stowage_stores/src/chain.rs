// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Ordered composition of pools, fastest first.

use std::time::Duration;

use stowage_pool::{CacheItem, DynamicPool, Error, Expiration, ItemPool, Result, validate_key};

/// Pool for the `chain` driver.
///
/// Reads walk the pools in order and return the first hit. A hit found
/// further down the chain is copied into every earlier pool, so the next
/// read is served by the first one. Copies keep the item's own expiry, or
/// receive the chain lifetime when the item has none.
///
/// Writes, deletes, clears and commits go to every pool. They report
/// `true` only when all pools do; if a pool fails, the remaining pools are
/// still tried and the first error is returned.
///
/// # Examples
///
/// ```
/// use stowage_pool::{CacheItem, IntoDynamicPool, ItemPool};
/// use stowage_stores::{ChainPool, MemoryBackend, StorePool};
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let near = StorePool::new(MemoryBackend::<u8>::new(false), clock.clone()).into_dynamic();
/// let far = StorePool::new(MemoryBackend::<u8>::new(true), clock).into_dynamic();
/// far.save(CacheItem::hit("k", 9))?;
///
/// let chain = ChainPool::new(vec![near.clone(), far], None)?;
/// assert_eq!(chain.get_item("k")?.get(), Some(&9));
/// assert!(near.has_item("k")?, "hit was copied forward");
/// # Ok::<(), stowage_pool::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ChainPool<V> {
    pools: Vec<DynamicPool<V>>,
    lifetime: Option<Duration>,
}

impl<V> ChainPool<V> {
    /// Creates a chain over `pools`, in read order.
    ///
    /// `lifetime` applies to back-filled copies of items without an expiry;
    /// zero means none.
    ///
    /// # Errors
    ///
    /// Returns an error if `pools` is empty.
    pub fn new(pools: Vec<DynamicPool<V>>, lifetime: Option<Duration>) -> Result<Self> {
        if pools.is_empty() {
            return Err(Error::from_message("a chain needs at least one store"));
        }
        Ok(Self {
            pools,
            lifetime: lifetime.filter(|d| !d.is_zero()),
        })
    }

    /// Returns the chained pools in read order.
    #[must_use]
    pub fn pools(&self) -> &[DynamicPool<V>] {
        &self.pools
    }

    fn all(&self, mut op: impl FnMut(&DynamicPool<V>) -> Result<bool>) -> Result<bool> {
        let mut ok = true;
        let mut first_error = None;
        for pool in &self.pools {
            match op(pool) {
                Ok(done) => ok &= done,
                Err(e) => {
                    ok = false;
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(ok), Err)
    }
}

impl<V> ChainPool<V>
where
    V: Clone + Send + Sync,
{
    fn back_fill(&self, upto: usize, hit: &CacheItem<V>) {
        let Some(value) = hit.get() else {
            return;
        };
        let expiration = hit
            .expiration()
            .or_else(|| self.lifetime.map(Expiration::After));

        for pool in &self.pools[..upto] {
            let mut copy = CacheItem::new(hit.key());
            copy.set(value.clone()).set_expiration(expiration);
            if let Err(e) = pool.save(copy) {
                tracing::warn!(cache.key = hit.key(), error = %e, "chain back-fill failed");
            }
        }
    }
}

impl<V> ItemPool<V> for ChainPool<V>
where
    V: Clone + Send + Sync,
{
    fn get_item(&self, key: &str) -> Result<CacheItem<V>> {
        validate_key(key)?;
        for (index, pool) in self.pools.iter().enumerate() {
            let item = pool.get_item(key)?;
            if item.is_hit() {
                self.back_fill(index, &item);
                return Ok(item);
            }
        }
        Ok(CacheItem::new(key))
    }

    fn has_item(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        for pool in &self.pools {
            if pool.has_item(key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn clear(&self) -> Result<bool> {
        self.all(|pool| pool.clear())
    }

    fn delete_item(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.all(|pool| pool.delete_item(key))
    }

    fn save(&self, item: CacheItem<V>) -> Result<bool> {
        validate_key(item.key())?;
        self.all(|pool| pool.save(item.clone()))
    }

    fn save_deferred(&self, item: CacheItem<V>) -> Result<bool> {
        validate_key(item.key())?;
        self.all(|pool| pool.save_deferred(item.clone()))
    }

    fn commit(&self) -> Result<bool> {
        self.all(|pool| pool.commit())
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use stowage_pool::testing::{MockPool, PoolOp};

    use super::*;

    fn chain(lifetime: Option<Duration>) -> (MockPool<u32>, MockPool<u32>, ChainPool<u32>) {
        let near = MockPool::new();
        let far = MockPool::new();
        let chain = ChainPool::new(
            vec![DynamicPool::new(near.clone()), DynamicPool::new(far.clone())],
            lifetime,
        )
        .expect("chain");
        (near, far, chain)
    }

    #[test]
    fn empty_chain_is_rejected() {
        ChainPool::<u32>::new(Vec::new(), None).expect_err("no pools");
    }

    #[test]
    fn first_hit_wins() {
        let (near, far, chain) = chain(None);
        near.save(CacheItem::hit("k", 1)).expect("save");
        far.save(CacheItem::hit("k", 2)).expect("save");
        far.clear_operations();

        assert_eq!(chain.get_item("k").expect("get").get(), Some(&1));
        assert!(far.operations().is_empty(), "far pool is not consulted");
    }

    #[test]
    fn back_fill_applies_chain_lifetime() {
        let (near, far, chain) = chain(Some(Duration::from_secs(30)));
        far.save(CacheItem::hit("k", 2)).expect("save");

        assert_eq!(chain.get_item("k").expect("get").get(), Some(&2));

        let saved = near.operations().into_iter().find_map(|op| match op {
            PoolOp::Save(item) => Some(item),
            _ => None,
        });
        let saved = saved.expect("back-filled");
        assert_eq!(saved.get(), Some(&2));
        assert_eq!(saved.expiration(), Some(Expiration::After(Duration::from_secs(30))));
    }

    #[test]
    fn back_fill_keeps_item_expiry() {
        let (near, far, chain) = chain(Some(Duration::from_secs(30)));
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let mut item = CacheItem::hit("k", 2);
        item.expires_at(Some(at));
        far.save(item).expect("save");

        chain.get_item("k").expect("get");
        let stored = near.get_item("k").expect("get");
        assert_eq!(stored.expiration(), Some(Expiration::At(at)));
    }

    #[test]
    fn back_fill_failure_is_not_fatal() {
        let (near, far, chain) = chain(None);
        far.save(CacheItem::hit("k", 2)).expect("save");
        near.fail_when(|op| matches!(op, PoolOp::Save(_)));

        assert_eq!(chain.get_item("k").expect("get").get(), Some(&2));
    }

    #[test]
    fn writes_reach_every_pool() {
        let (near, far, chain) = chain(None);
        assert!(chain.save(CacheItem::hit("k", 1)).expect("save"));
        assert!(near.contains_key("k"));
        assert!(far.contains_key("k"));

        assert!(chain.delete_item("k").expect("delete"));
        assert!(!near.contains_key("k"));
        assert!(!far.contains_key("k"));
    }

    #[test]
    fn failing_pool_does_not_stop_the_others() {
        let (near, far, chain) = chain(None);
        near.fail_when(|op| matches!(op, PoolOp::Save(_)));

        chain.save(CacheItem::hit("k", 1)).expect_err("near fails");
        assert!(far.contains_key("k"));
    }

    #[test]
    fn has_item_checks_any_pool() {
        let (_, far, chain) = chain(None);
        assert!(!chain.has_item("k").expect("has"));
        far.save(CacheItem::hit("k", 1)).expect("save");
        assert!(chain.has_item("k").expect("has"));
    }

    #[test]
    fn deferred_items_reach_every_pool_on_commit() {
        let (near, far, chain) = chain(None);
        chain.save_deferred(CacheItem::hit("k", 1)).expect("save_deferred");
        assert_eq!(near.deferred_count(), 1);
        assert!(chain.commit().expect("commit"));
        assert!(near.contains_key("k"));
        assert!(far.contains_key("k"));
    }
}
