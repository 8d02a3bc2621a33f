// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{path::Path, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use stowage_pool::{Error, Result};

/// Shared handle to a SQLite connection.
///
/// Clones share one connection; statements from different stores are
/// serialized on it.
#[derive(Debug, Clone)]
pub struct SqlConnection(Arc<Mutex<Connection>>);

impl SqlConnection {
    /// Opens (or creates) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Connection::open(path).map(Self::from).map_err(Error::from_source)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        Connection::open_in_memory().map(Self::from).map_err(Error::from_source)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.0.lock()
    }

    /// Returns `true` if both handles share one connection.
    #[must_use]
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Connection> for SqlConnection {
    fn from(connection: Connection) -> Self {
        Self(Arc::new(Mutex::new(connection)))
    }
}
