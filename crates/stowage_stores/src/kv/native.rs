// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use parking_lot::Mutex;
use redis::{ConnectionLike, RedisResult, cluster::ClusterClient};
use stowage_pool::{Error, Result};
use xxhash_rust::xxh3::xxh3_64;

use super::KeyValueClient;

const SCAN_BATCH: usize = 1000;

/// Something that can open a blocking connection.
pub(super) trait Connect: Send + Sync {
    type Connection: ConnectionLike + Send + 'static;

    /// Cluster connections cannot `SCAN` across nodes and use `KEYS` instead.
    const CLUSTER: bool;

    fn connect(&self) -> RedisResult<Self::Connection>;
}

impl Connect for redis::Client {
    type Connection = redis::Connection;

    const CLUSTER: bool = false;

    fn connect(&self) -> RedisResult<Self::Connection> {
        self.get_connection()
    }
}

impl Connect for ClusterClient {
    type Connection = redis::cluster::ClusterConnection;

    const CLUSTER: bool = true;

    fn connect(&self) -> RedisResult<Self::Connection> {
        self.get_connection()
    }
}

/// A client with one lazily opened connection.
///
/// A connection that fails a command is dropped and reopened on next use.
pub(super) struct Node<C: Connect> {
    client: C,
    connection: Mutex<Option<C::Connection>>,
}

impl<C: Connect> std::fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("cluster", &C::CLUSTER)
            .field("connected", &self.connection.lock().is_some())
            .finish()
    }
}

impl<C: Connect> Node<C> {
    pub(super) fn new(client: C) -> Self {
        Self {
            client,
            connection: Mutex::new(None),
        }
    }

    fn with_connection<T>(&self, command: impl FnOnce(&mut dyn ConnectionLike) -> RedisResult<T>) -> Result<T> {
        let mut slot = self.connection.lock();
        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => self.client.connect().map_err(Error::from_source)?,
        };

        match command(&mut connection) {
            Ok(value) => {
                *slot = Some(connection);
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(error = %e, "dropping redis connection after failed command");
                Err(Error::from_source(e))
            }
        }
    }
}

impl<C: Connect> KeyValueClient for Node<C> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_connection(|conn| redis::cmd("GET").arg(key).query::<Option<Vec<u8>>>(conn))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut command = redis::cmd("SET");
        command.arg(key).arg(value);
        if let Some(ttl) = ttl {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            command.arg("PX").arg(millis);
        }
        self.with_connection(|conn| command.query::<()>(conn))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.with_connection(|conn| redis::cmd("DEL").arg(key).query::<i64>(conn))
            .map(|_| ())
    }

    fn delete_matching(&self, prefix: &str) -> Result<()> {
        let pattern = format!("{}*", escape_glob(prefix));

        if C::CLUSTER {
            let keys = self.with_connection(|conn| redis::cmd("KEYS").arg(&pattern).query::<Vec<String>>(conn))?;
            for key in keys {
                self.delete(&key)?;
            }
            return Ok(());
        }

        let mut cursor = 0_u64;
        loop {
            let (next, keys) = self.with_connection(|conn| {
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query::<(u64, Vec<String>)>(conn)
            })?;

            if !keys.is_empty() {
                self.with_connection(|conn| redis::cmd("DEL").arg(&keys).query::<i64>(conn))?;
            }

            cursor = next;
            if cursor == 0 {
                return Ok(());
            }
        }
    }

    fn flush(&self) -> Result<()> {
        self.with_connection(|conn| redis::cmd("FLUSHDB").query::<()>(conn))
    }
}

/// Independent servers addressed by key hash.
#[derive(Debug)]
pub(super) struct Sharded {
    nodes: Vec<Node<redis::Client>>,
}

impl Sharded {
    pub(super) fn new(clients: Vec<redis::Client>) -> Result<Self> {
        if clients.is_empty() {
            return Err(Error::from_message("a sharded redis connection needs at least one server"));
        }
        Ok(Self {
            nodes: clients.into_iter().map(Node::new).collect(),
        })
    }

    fn node_for(&self, key: &str) -> &Node<redis::Client> {
        let len = self.nodes.len() as u64;
        let index = usize::try_from(xxh3_64(key.as_bytes()) % len).unwrap_or_default();
        &self.nodes[index]
    }
}

impl KeyValueClient for Sharded {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.node_for(key).get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.node_for(key).set(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.node_for(key).delete(key)
    }

    fn delete_matching(&self, prefix: &str) -> Result<()> {
        self.nodes.iter().try_for_each(|node| node.delete_matching(prefix))
    }

    fn flush(&self) -> Result<()> {
        self.nodes.iter().try_for_each(|node| node.flush())
    }
}

/// Escapes the glob metacharacters `SCAN MATCH` and `KEYS` interpret.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
