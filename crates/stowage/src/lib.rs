// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A multi-backend cache manager with a convenience facade.
//!
//! A [`CacheManager`] holds a set of named store configurations and builds
//! each store the first time it is asked for. Built stores are shared: every
//! later request for the same name, and every `chain` or `phparray` store
//! built on top of it, uses the same instance.
//!
//! Stores are handed out as [`Repository`] values, which add the everyday
//! operations ([`get`](Repository::get), [`put`](Repository::put),
//! [`remember`](Repository::remember), [`pull`](Repository::pull), ...) on
//! top of the [`ItemPool`] contract. The manager forwards the same
//! operations to its default store.
//!
//! # Quick Start
//!
//! ```
//! use stowage::{CacheManager, ManagerConfig};
//!
//! let config = ManagerConfig::from_json(
//!     r#"{
//!         "default": "local",
//!         "stores": {
//!             "local": { "driver": "array", "lifetime": 600 },
//!             "layered": { "driver": "chain", "stores": ["local", "shared"] },
//!             "shared": { "driver": "apcu", "namespace": "quickstart" }
//!         }
//!     }"#,
//! )?;
//! let manager = CacheManager::<String>::new(config);
//!
//! let greeting = manager.remember("greeting", 60, || "hello".to_string())?;
//! assert_eq!(greeting, "hello");
//!
//! let layered = manager.driver("layered")?;
//! layered.put("user:7", "grace".to_string(), 0)?;
//! assert!(manager.has("user:7")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Drivers
//!
//! | Driver | Store |
//! |---|---|
//! | `array` | In-process memory, optionally storing serialized copies. |
//! | `null` | Stores nothing. |
//! | `file` | One file per key under a directory. |
//! | `phpfiles` | One file per key, kept in memory once loaded. |
//! | `apcu` | Memory shared by every store in the process with the same namespace. |
//! | `phparray` | A read-only snapshot in front of a `fallback` store. |
//! | `pdo` | A SQL table over a connection registered with `set_pdo_connection`. |
//! | `redis` | A Redis server, shard set or cluster registered with `set_redis_connection`. |
//! | `chain` | Several `stores`, fastest first. |
//!
//! Other names can be served by factories registered with
//! [`CacheManager::extend`].
//!
//! # Features
//!
//! - `sql` (default): the `pdo` driver.
//! - `redis` (default): native Redis clients.
//! - `metrics`: OpenTelemetry instruments via [`CacheManagerBuilder::metrics`].

mod config;
mod context;
mod drivers;
mod error;
mod manager;
mod repository;
mod telemetry;
mod ttl;

#[doc(inline)]
pub use config::{Driver, ManagerConfig, StoreConfig};
#[doc(inline)]
pub use context::StoreContext;
#[doc(inline)]
pub use error::ConfigError;
#[doc(inline)]
pub use manager::{CacheManager, CacheManagerBuilder};
#[doc(inline)]
pub use repository::Repository;
#[doc(no_inline)]
pub use stowage_pool::{CacheItem, DynamicPool, Error, Expiration, ItemPool, Result};
#[doc(no_inline)]
pub use stowage_stores::{RedisConnection, SqlOptions};
#[cfg(feature = "sql")]
#[doc(no_inline)]
pub use stowage_stores::SqlConnection;
#[doc(inline)]
pub use ttl::{FOREVER, Ttl};
