// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Cache stores implementing the [`ItemPool`](stowage_pool::ItemPool) contract.
//!
//! Most stores are a [`StorePool`] over a [`Backend`]. The backend moves
//! [`Record`]s in and out of its storage; the pool adds key validation,
//! expiry checks, the default lifetime and the deferred queue. Stores that
//! compose other stores ([`ChainPool`], [`SnapshotPool`]) or store nothing
//! ([`NullPool`]) implement the pool contract directly.
//!
//! # Quick Start
//!
//! ```
//! use stowage_pool::{CacheItem, ItemPool};
//! use stowage_stores::{MemoryBackend, StorePool};
//! use tick::Clock;
//!
//! let clock = Clock::new_frozen();
//! let pool = StorePool::new(MemoryBackend::<i32>::new(true), clock);
//!
//! let mut item = pool.get_item("answer")?;
//! item.set(42);
//! assert!(pool.save(item)?);
//! assert_eq!(pool.get_item("answer")?.get(), Some(&42));
//! # Ok::<(), stowage_pool::Error>(())
//! ```
//!
//! # Features
//!
//! - `sql`: [`SqlBackend`] over a `rusqlite` connection.
//! - `redis`: native Redis clients for [`RedisConnection`]. The
//!   [`RedisBackend`] itself works with any [`KeyValueClient`].

mod backend;
mod chain;
mod codec;
mod compiled;
mod filesystem;
mod kv;
mod layout;
mod memory;
mod namespace;
mod null;
mod shared;
mod snapshot;
mod sql;
mod store;
mod value;

#[doc(inline)]
pub use backend::{Backend, Record};
#[doc(inline)]
pub use chain::ChainPool;
#[doc(inline)]
pub use compiled::CompiledFilesBackend;
#[doc(inline)]
pub use filesystem::FilesystemBackend;
#[doc(inline)]
pub use kv::{KeyValueClient, RedisBackend, RedisConnection};
#[doc(inline)]
pub use memory::MemoryBackend;
#[doc(inline)]
pub use namespace::validate_namespace;
#[doc(inline)]
pub use null::NullPool;
#[doc(inline)]
pub use shared::SharedMemoryBackend;
#[doc(inline)]
pub use snapshot::SnapshotPool;
#[doc(inline)]
pub use sql::SqlOptions;
#[cfg(feature = "sql")]
#[doc(inline)]
pub use sql::{SqlBackend, SqlConnection};
#[doc(inline)]
pub use store::{PRUNE_INTERVAL, StorePool};
#[doc(inline)]
pub use value::CacheValue;

/// Directory under the system temp dir used when a store has no explicit path.
pub const DEFAULT_DIRECTORY: &str = "stowage";
