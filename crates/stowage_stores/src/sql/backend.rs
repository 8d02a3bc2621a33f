// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    marker::PhantomData,
    time::{Duration, SystemTime},
};

use once_cell::sync::OnceCell;
use rusqlite::{Connection, OptionalExtension, params};
use stowage_pool::{Error, Result};
use tick::Clock;

use super::{SqlConnection, SqlOptions};
use crate::{Backend, CacheValue, Record, codec, namespace::qualify, validate_namespace};

/// Backend for the `pdo` driver.
///
/// Rows are keyed by `namespace:key`. The table is created on first use if
/// it does not exist, so a store over a fresh database needs no setup.
/// Besides the encoded record, each row carries its lifetime and write time
/// in seconds so expired rows can be removed in bulk with [`prune`](Backend::prune),
/// which deletes elapsed rows of every namespace in the table.
///
/// # Examples
///
/// ```
/// use stowage_pool::{CacheItem, ItemPool};
/// use stowage_stores::{SqlBackend, SqlConnection, SqlOptions, StorePool};
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let connection = SqlConnection::open_in_memory()?;
/// let backend = SqlBackend::<String>::new(connection, "app", SqlOptions::default(), clock.clone())?;
/// let pool = StorePool::new(backend, clock);
///
/// pool.save(CacheItem::hit("motd", "welcome".to_string()))?;
/// assert_eq!(pool.get_item("motd")?.get().map(String::as_str), Some("welcome"));
/// # Ok::<(), stowage_pool::Error>(())
/// ```
#[derive(Debug)]
pub struct SqlBackend<V> {
    connection: SqlConnection,
    namespace: String,
    options: SqlOptions,
    clock: Clock,
    table_ready: OnceCell<()>,
    _phantom: PhantomData<fn() -> V>,
}

impl<V> SqlBackend<V> {
    /// Creates a backend over `connection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace or any table/column name is invalid.
    pub fn new(connection: SqlConnection, namespace: &str, options: SqlOptions, clock: Clock) -> Result<Self> {
        validate_namespace(namespace)?;
        options.validate()?;
        Ok(Self {
            connection,
            namespace: namespace.to_owned(),
            options,
            clock,
            table_ready: OnceCell::new(),
            _phantom: PhantomData,
        })
    }

    /// Returns the table and column names in use.
    #[must_use]
    pub fn options(&self) -> &SqlOptions {
        &self.options
    }

    /// Returns the shared connection.
    #[must_use]
    pub fn connection(&self) -> &SqlConnection {
        &self.connection
    }

    /// Creates the cache table if it does not exist yet.
    ///
    /// Called implicitly by every other operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn create_table(&self) -> Result<()> {
        self.table_ready
            .get_or_try_init(|| {
                let SqlOptions {
                    db_table,
                    db_id_col,
                    db_data_col,
                    db_lifetime_col,
                    db_time_col,
                } = &self.options;
                let sql = format!(
                    "CREATE TABLE IF NOT EXISTS {db_table} (\
                     {db_id_col} VARCHAR(255) NOT NULL PRIMARY KEY, \
                     {db_data_col} BLOB NOT NULL, \
                     {db_lifetime_col} INTEGER, \
                     {db_time_col} INTEGER NOT NULL)"
                );
                self.connection.lock().execute(&sql, []).map(|_| ()).map_err(Error::from_source)
            })
            .copied()
    }

    fn run<T>(&self, statement: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        self.create_table()?;
        let conn = self.connection.lock();
        statement(&conn).map_err(Error::from_source)
    }
}

impl<V> Backend<V> for SqlBackend<V>
where
    V: CacheValue,
{
    fn fetch(&self, key: &str) -> Result<Option<Record<V>>> {
        let SqlOptions {
            db_table,
            db_id_col,
            db_data_col,
            ..
        } = &self.options;
        let sql = format!("SELECT {db_data_col} FROM {db_table} WHERE {db_id_col} = ?1");
        let id = qualify(&self.namespace, key);

        let data = self.run(|conn| conn.query_row(&sql, params![id], |row| row.get::<_, Vec<u8>>(0)).optional())?;
        data.map(|bytes| codec::decode(&bytes)).transpose()
    }

    fn store(&self, key: &str, record: Record<V>, ttl: Option<Duration>) -> Result<bool> {
        let SqlOptions {
            db_table,
            db_id_col,
            db_data_col,
            db_lifetime_col,
            db_time_col,
        } = &self.options;
        let sql = format!(
            "INSERT OR REPLACE INTO {db_table} ({db_id_col}, {db_data_col}, {db_lifetime_col}, {db_time_col}) VALUES (?1, ?2, ?3, ?4)"
        );
        let id = qualify(&self.namespace, key);
        let data = codec::encode(&record)?;
        let lifetime = ttl.map(ceil_seconds);
        let time = unix_seconds(self.clock.system_time());

        self.run(|conn| conn.execute(&sql, params![id, data, lifetime, time]))
            .map(|rows| rows > 0)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let SqlOptions { db_table, db_id_col, .. } = &self.options;
        let sql = format!("DELETE FROM {db_table} WHERE {db_id_col} = ?1");
        let id = qualify(&self.namespace, key);

        self.run(|conn| conn.execute(&sql, params![id])).map(|_| true)
    }

    fn purge(&self) -> Result<bool> {
        let SqlOptions { db_table, db_id_col, .. } = &self.options;

        if self.namespace.is_empty() {
            let sql = format!("DELETE FROM {db_table}");
            return self.run(|conn| conn.execute(&sql, [])).map(|_| true);
        }

        let prefix = format!("{}:", self.namespace);
        let prefix_len = i64::try_from(prefix.len()).map_err(Error::from_source)?;
        let sql = format!("DELETE FROM {db_table} WHERE substr({db_id_col}, 1, ?1) = ?2");
        self.run(|conn| conn.execute(&sql, params![prefix_len, prefix])).map(|_| true)
    }

    fn prune(&self, now: SystemTime) -> Result<usize> {
        let SqlOptions {
            db_table,
            db_lifetime_col,
            db_time_col,
            ..
        } = &self.options;
        let sql = format!("DELETE FROM {db_table} WHERE {db_lifetime_col} IS NOT NULL AND {db_time_col} + {db_lifetime_col} <= ?1");
        self.run(|conn| conn.execute(&sql, params![unix_seconds(now)]))
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

fn ceil_seconds(ttl: Duration) -> i64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    i64::try_from(secs).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(namespace: &str, connection: &SqlConnection, clock: &Clock) -> SqlBackend<String> {
        SqlBackend::new(connection.clone(), namespace, SqlOptions::default(), clock.clone()).expect("backend")
    }

    fn row_count(connection: &SqlConnection) -> i64 {
        connection
            .lock()
            .query_row("SELECT COUNT(*) FROM cache_items", [], |row| row.get(0))
            .expect("count")
    }

    #[test]
    fn table_is_created_lazily() {
        let clock = Clock::new_frozen();
        let connection = SqlConnection::open_in_memory().expect("open");
        let backend = backend("ns", &connection, &clock);

        assert_eq!(backend.fetch("missing").expect("fetch"), None);
        assert_eq!(row_count(&connection), 0);
    }

    #[test]
    fn purge_is_scoped_to_namespace() {
        let clock = Clock::new_frozen();
        let connection = SqlConnection::open_in_memory().expect("open");
        let a = backend("a", &connection, &clock);
        let ab = backend("ab", &connection, &clock);

        a.store("k", Record::new("1".into(), None), None).expect("store");
        ab.store("k", Record::new("2".into(), None), None).expect("store");

        assert!(a.purge().expect("purge"));
        assert_eq!(a.fetch("k").expect("fetch"), None);
        assert_eq!(ab.fetch("k").expect("fetch").map(|r| r.value), Some("2".to_owned()));
    }

    #[test]
    fn empty_namespace_purges_whole_table() {
        let clock = Clock::new_frozen();
        let connection = SqlConnection::open_in_memory().expect("open");
        let scoped = backend("scoped", &connection, &clock);
        let global = backend("", &connection, &clock);

        scoped.store("k", Record::new("1".into(), None), None).expect("store");
        global.store("k", Record::new("2".into(), None), None).expect("store");
        assert_eq!(row_count(&connection), 2);

        global.purge().expect("purge");
        assert_eq!(row_count(&connection), 0);
    }

    #[test]
    fn prune_removes_elapsed_rows() {
        let control = tick::ClockControl::new();
        let clock = control.to_clock();
        let connection = SqlConnection::open_in_memory().expect("open");
        let backend = backend("ns", &connection, &clock);

        let now = clock.system_time();
        backend
            .store("short", Record::new("s".into(), Some(now + Duration::from_secs(5))), Some(Duration::from_secs(5)))
            .expect("store");
        backend.store("forever", Record::new("f".into(), None), None).expect("store");

        assert_eq!(backend.prune(clock.system_time()).expect("prune"), 0);
        control.advance(Duration::from_secs(5));
        assert_eq!(backend.prune(clock.system_time()).expect("prune"), 1);
        assert_eq!(row_count(&connection), 1);
    }

    #[test]
    fn lifetime_rounds_up() {
        assert_eq!(ceil_seconds(Duration::from_millis(1)), 1);
        assert_eq!(ceil_seconds(Duration::from_secs(2)), 2);
        assert_eq!(ceil_seconds(Duration::from_millis(2001)), 3);
    }

    #[test]
    fn custom_names_are_used() {
        let clock = Clock::new_frozen();
        let connection = SqlConnection::open_in_memory().expect("open");
        let options = SqlOptions {
            db_table: "kv".into(),
            db_id_col: "k".into(),
            db_data_col: "v".into(),
            db_lifetime_col: "ttl".into(),
            db_time_col: "ts".into(),
        };
        let backend = SqlBackend::<String>::new(connection.clone(), "", options, clock).expect("backend");
        backend.store("x", Record::new("y".into(), None), None).expect("store");

        let count: i64 = connection
            .lock()
            .query_row("SELECT COUNT(*) FROM kv WHERE k = 'x'", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
