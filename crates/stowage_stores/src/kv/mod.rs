// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Key-value server storage for the `redis` driver.

#[cfg(feature = "redis")]
mod native;

use std::{fmt::Debug, marker::PhantomData, sync::Arc, time::Duration};

use stowage_pool::{Error, Result};

use crate::{Backend, CacheValue, Record, codec, namespace::qualify, validate_namespace};

/// Byte-level operations of a Redis-like server.
///
/// [`RedisBackend`] only talks to the server through this trait, so any
/// server speaking the same model (or an in-process fake) can stand in for
/// Redis via [`RedisConnection::Custom`].
pub trait KeyValueClient: Send + Sync + Debug {
    /// Reads the raw bytes stored at `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `value` at `key`, expiring after `ttl` when given.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Removes `key`. Removing an absent key succeeds.
    fn delete(&self, key: &str) -> Result<()>;

    /// Removes every key starting with `prefix`.
    fn delete_matching(&self, prefix: &str) -> Result<()>;

    /// Removes every key of the selected database.
    fn flush(&self) -> Result<()>;
}

/// A connection handed to the cache manager for a named Redis store.
#[derive(Clone)]
#[non_exhaustive]
pub enum RedisConnection {
    /// One server.
    #[cfg(feature = "redis")]
    Single(redis::Client),
    /// Independent servers; each key lives on the server picked by hashing it.
    #[cfg(feature = "redis")]
    Sharded(Vec<redis::Client>),
    /// A Redis Cluster.
    #[cfg(feature = "redis")]
    Cluster(redis::cluster::ClusterClient),
    /// Any other client.
    Custom(Arc<dyn KeyValueClient>),
}

impl Debug for RedisConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "redis")]
            Self::Single(_) => f.write_str("RedisConnection::Single"),
            #[cfg(feature = "redis")]
            Self::Sharded(clients) => write!(f, "RedisConnection::Sharded({} nodes)", clients.len()),
            #[cfg(feature = "redis")]
            Self::Cluster(_) => f.write_str("RedisConnection::Cluster"),
            Self::Custom(client) => f.debug_tuple("RedisConnection::Custom").field(client).finish(),
        }
    }
}

impl RedisConnection {
    /// Wraps a custom client.
    pub fn custom(client: impl KeyValueClient + 'static) -> Self {
        Self::Custom(Arc::new(client))
    }

    /// Opens clients for one or more `redis://` URLs.
    ///
    /// A single URL yields [`Single`](Self::Single), several yield
    /// [`Sharded`](Self::Sharded). No connection is made until first use.
    ///
    /// # Errors
    ///
    /// Returns an error if `urls` is empty or any URL is malformed.
    #[cfg(feature = "redis")]
    pub fn open<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut clients = urls
            .into_iter()
            .map(|url| redis::Client::open(url.as_ref()).map_err(Error::from_source))
            .collect::<Result<Vec<_>>>()?;

        match clients.len() {
            0 => Err(Error::from_message("no redis server given")),
            1 => Ok(Self::Single(clients.remove(0))),
            _ => Ok(Self::Sharded(clients)),
        }
    }

    pub(crate) fn into_client(self) -> Result<Arc<dyn KeyValueClient>> {
        match self {
            #[cfg(feature = "redis")]
            Self::Single(client) => Ok(Arc::new(native::Node::new(client))),
            #[cfg(feature = "redis")]
            Self::Sharded(clients) => Ok(Arc::new(native::Sharded::new(clients)?)),
            #[cfg(feature = "redis")]
            Self::Cluster(client) => Ok(Arc::new(native::Node::new(client))),
            Self::Custom(client) => Ok(client),
        }
    }
}

/// Backend for the `redis` driver.
///
/// Keys are stored as `namespace:key` with postcard-encoded records, and the
/// server is told to expire them with the record. Purging a namespaced
/// backend removes only its own keys; with an empty namespace it flushes the
/// whole database.
#[derive(Debug, Clone)]
pub struct RedisBackend<V> {
    client: Arc<dyn KeyValueClient>,
    namespace: String,
    _phantom: PhantomData<fn() -> V>,
}

impl<V> RedisBackend<V> {
    /// Creates a backend over `connection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is invalid or a sharded connection
    /// has no servers.
    pub fn new(connection: RedisConnection, namespace: &str) -> Result<Self> {
        validate_namespace(namespace)?;
        Ok(Self {
            client: connection.into_client()?,
            namespace: namespace.to_owned(),
            _phantom: PhantomData,
        })
    }

    /// Returns the namespace prefixed to every key.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl<V> Backend<V> for RedisBackend<V>
where
    V: CacheValue,
{
    fn fetch(&self, key: &str) -> Result<Option<Record<V>>> {
        self.client
            .get(&qualify(&self.namespace, key))?
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    fn store(&self, key: &str, record: Record<V>, ttl: Option<Duration>) -> Result<bool> {
        let bytes = codec::encode(&record)?;
        self.client.set(&qualify(&self.namespace, key), &bytes, ttl)?;
        Ok(true)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.client.delete(&qualify(&self.namespace, key))?;
        Ok(true)
    }

    fn purge(&self) -> Result<bool> {
        if self.namespace.is_empty() {
            self.client.flush()?;
        } else {
            self.client.delete_matching(&format!("{}:", self.namespace))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct Fake {
        data: Mutex<BTreeMap<String, (Vec<u8>, Option<Duration>)>>,
        flushed: Mutex<u32>,
    }

    impl KeyValueClient for Fake {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.data.lock().get(key).map(|(bytes, _)| bytes.clone()))
        }

        fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
            self.data.lock().insert(key.to_owned(), (value.to_vec(), ttl));
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.data.lock().remove(key);
            Ok(())
        }

        fn delete_matching(&self, prefix: &str) -> Result<()> {
            self.data.lock().retain(|key, _| !key.starts_with(prefix));
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            *self.flushed.lock() += 1;
            self.data.lock().clear();
            Ok(())
        }
    }

    fn shared_fake() -> (Arc<Fake>, RedisConnection) {
        let fake = Arc::new(Fake::default());
        let connection = RedisConnection::Custom(Arc::clone(&fake) as Arc<dyn KeyValueClient>);
        (fake, connection)
    }

    #[test]
    fn keys_are_namespaced_and_ttl_forwarded() {
        let (fake, connection) = shared_fake();
        let backend = RedisBackend::<u32>::new(connection, "app").expect("backend");

        backend
            .store("k", Record::new(7, None), Some(Duration::from_secs(3)))
            .expect("store");

        let data = fake.data.lock();
        let (_, ttl) = data.get("app:k").expect("namespaced key");
        assert_eq!(*ttl, Some(Duration::from_secs(3)));
    }

    #[test]
    fn purge_with_namespace_keeps_other_keys() {
        let (fake, connection) = shared_fake();
        let backend = RedisBackend::<u32>::new(connection, "app").expect("backend");
        fake.set("other:k", b"x", None).expect("set");
        backend.store("k", Record::new(1, None), None).expect("store");

        backend.purge().expect("purge");

        assert_eq!(backend.fetch("k").expect("fetch"), None);
        assert!(fake.data.lock().contains_key("other:k"));
        assert_eq!(*fake.flushed.lock(), 0);
    }

    #[test]
    fn purge_without_namespace_flushes() {
        let (fake, connection) = shared_fake();
        let backend = RedisBackend::<u32>::new(connection, "").expect("backend");
        backend.store("k", Record::new(1, None), None).expect("store");
        assert!(fake.data.lock().contains_key("k"));

        backend.purge().expect("purge");
        assert_eq!(*fake.flushed.lock(), 1);
    }

    #[test]
    fn invalid_namespace_is_rejected() {
        let (_, connection) = shared_fake();
        RedisBackend::<u32>::new(connection, "a:b").expect_err("colon is not allowed");
    }
}
