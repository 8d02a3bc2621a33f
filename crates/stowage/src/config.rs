// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Declarative description of the stores a [`CacheManager`](crate::CacheManager) can build.

use std::{collections::HashMap, fmt, path::PathBuf};

use serde::Deserialize;
use stowage_stores::SqlOptions;

/// The kind of store a [`StoreConfig`] describes.
///
/// Names that match no built-in driver are kept in [`Driver::Unknown`] so
/// that a custom factory registered with
/// [`CacheManager::extend`](crate::CacheManager::extend) can serve them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum Driver {
    /// In-process memory.
    Array,
    /// Stores nothing.
    Null,
    /// One JSON file per key.
    File,
    /// One binary file per key with an in-process decoded copy.
    PhpFiles,
    /// Read-only snapshot in front of a fallback store.
    PhpArray,
    /// Memory shared by every store with the same namespace in the process.
    Apcu,
    /// A SQL table.
    Pdo,
    /// A Redis server, shard set or cluster.
    Redis,
    /// An ordered list of other stores.
    Chain,
    /// Any other name.
    Unknown(String),
}

impl Driver {
    /// Returns the configuration name of the driver.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Array => "array",
            Self::Null => "null",
            Self::File => "file",
            Self::PhpFiles => "phpfiles",
            Self::PhpArray => "phparray",
            Self::Apcu => "apcu",
            Self::Pdo => "pdo",
            Self::Redis => "redis",
            Self::Chain => "chain",
            Self::Unknown(name) => name,
        }
    }
}

impl From<&str> for Driver {
    fn from(name: &str) -> Self {
        match name {
            "array" => Self::Array,
            "null" => Self::Null,
            "file" => Self::File,
            "phpfiles" => Self::PhpFiles,
            "phparray" => Self::PhpArray,
            "apcu" => Self::Apcu,
            "pdo" => Self::Pdo,
            "redis" => Self::Redis,
            "chain" => Self::Chain,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

impl From<String> for Driver {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Unknown(_) => Self::Unknown(name),
            known => known,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for one named store.
///
/// Only the fields relevant to the store's [`Driver`] are read; the rest are
/// ignored. Every field has a default, so a JSON store entry only needs a
/// `driver`.
///
/// # Examples
///
/// ```
/// use stowage::{Driver, StoreConfig};
///
/// let files = StoreConfig::new(Driver::File).namespace("pages").lifetime(300);
/// let chain = StoreConfig::new(Driver::Chain).stores(["array", "pages"]);
/// assert_eq!(chain.dependencies().collect::<Vec<_>>(), ["array", "pages"]);
/// # let _ = files;
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which kind of store to build.
    pub driver: Driver,
    /// Root directory (`file`, `phpfiles`) or snapshot file (`phparray`).
    pub path: Option<PathBuf>,
    /// Prefix isolating this store's keys from other stores on the same storage.
    pub namespace: String,
    /// Default lifetime in seconds for items saved without an expiry; 0 for none.
    pub lifetime: u64,
    /// Whether the `array` driver stores encoded copies instead of clones.
    pub serialize: bool,
    /// Version of the `apcu` segment; a change clears the segment.
    pub version: Option<String>,
    /// Store receiving the keys a `phparray` snapshot does not hold.
    pub fallback: Option<String>,
    /// Registered connection used by `pdo` and `redis`.
    pub connection: Option<String>,
    /// Stores composed by `chain`, in read order.
    pub stores: Vec<String>,
    /// Table and column names for `pdo`.
    pub options: SqlOptions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Array,
            path: None,
            namespace: String::new(),
            lifetime: 0,
            serialize: true,
            version: None,
            fallback: None,
            connection: None,
            stores: Vec::new(),
            options: SqlOptions::default(),
        }
    }
}

impl StoreConfig {
    /// Creates a configuration for `driver` with default settings.
    #[must_use]
    pub fn new(driver: impl Into<Driver>) -> Self {
        Self {
            driver: driver.into(),
            ..Self::default()
        }
    }

    /// Sets the root directory or snapshot file.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the default lifetime in seconds.
    #[must_use]
    pub fn lifetime(mut self, seconds: u64) -> Self {
        self.lifetime = seconds;
        self
    }

    /// Sets whether the `array` driver encodes values.
    #[must_use]
    pub fn serialize(mut self, serialize: bool) -> Self {
        self.serialize = serialize;
        self
    }

    /// Sets the `apcu` segment version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the `phparray` fallback store.
    #[must_use]
    pub fn fallback(mut self, store: impl Into<String>) -> Self {
        self.fallback = Some(store.into());
        self
    }

    /// Sets the registered connection name.
    #[must_use]
    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection = Some(name.into());
        self
    }

    /// Sets the stores composed by a `chain`.
    #[must_use]
    pub fn stores<I, S>(mut self, stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stores = stores.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the SQL table and column names.
    #[must_use]
    pub fn options(mut self, options: SqlOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the names of the other stores this store is built from.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        let stores = match self.driver {
            Driver::Chain => self.stores.as_slice(),
            _ => &[],
        };
        let fallback = match self.driver {
            Driver::PhpArray => self.fallback.as_deref(),
            _ => None,
        };
        stores.iter().map(String::as_str).chain(fallback)
    }
}

/// The stores a manager can build and which one is the default.
///
/// # Examples
///
/// ```
/// use stowage::ManagerConfig;
///
/// let config = ManagerConfig::from_json(
///     r#"{
///         "store": "local",
///         "stores": {
///             "local": { "driver": "array", "lifetime": 60 },
///             "none": { "driver": "null" }
///         }
///     }"#,
/// )?;
/// assert_eq!(config.store, "local");
/// assert_eq!(config.stores.len(), 2);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name of the store used when none is given.
    #[serde(alias = "default")]
    pub store: String,
    /// Store settings by name.
    pub stores: HashMap<String, StoreConfig>,
}

impl ManagerConfig {
    /// Creates a configuration whose default store is `store`, with no stores defined.
    #[must_use]
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            stores: HashMap::new(),
        }
    }

    /// Adds or replaces the store `name`.
    #[must_use]
    pub fn with_store(mut self, name: impl Into<String>, config: StoreConfig) -> Self {
        self.stores.insert(name.into(), config);
        self
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid configuration document.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
