// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Item-pool abstractions shared by every stowage cache store.
//!
//! This crate defines the [`ItemPool`] trait that all cache stores satisfy,
//! along with [`CacheItem`] for moving values and expirations between callers
//! and stores, the key rules enforced by every store, and the [`Error`] type
//! for fallible operations.
//!
//! # Overview
//!
//! A pool is addressed by string keys. Reading a key always produces a
//! [`CacheItem`]: a hit when the store holds a live value, a miss otherwise.
//! Items are mutated by the caller and handed back to [`ItemPool::save`] or
//! staged through [`ItemPool::save_deferred`] and [`ItemPool::commit`].
//!
//! # Implementing a Pool
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Mutex;
//!
//! use stowage_pool::{CacheItem, ItemPool, Result, validate_key};
//!
//! struct SimplePool(Mutex<HashMap<String, i32>>);
//!
//! impl ItemPool<i32> for SimplePool {
//!     fn get_item(&self, key: &str) -> Result<CacheItem<i32>> {
//!         validate_key(key)?;
//!         Ok(match self.0.lock().unwrap().get(key) {
//!             Some(value) => CacheItem::hit(key, *value),
//!             None => CacheItem::new(key),
//!         })
//!     }
//!
//!     fn has_item(&self, key: &str) -> Result<bool> {
//!         validate_key(key)?;
//!         Ok(self.0.lock().unwrap().contains_key(key))
//!     }
//!
//!     fn clear(&self) -> Result<bool> {
//!         self.0.lock().unwrap().clear();
//!         Ok(true)
//!     }
//!
//!     fn delete_item(&self, key: &str) -> Result<bool> {
//!         validate_key(key)?;
//!         self.0.lock().unwrap().remove(key);
//!         Ok(true)
//!     }
//!
//!     fn save(&self, item: CacheItem<i32>) -> Result<bool> {
//!         let (key, value, _) = item.into_parts();
//!         match value {
//!             Some(value) => {
//!                 self.0.lock().unwrap().insert(key, value);
//!                 Ok(true)
//!             }
//!             None => Ok(false),
//!         }
//!     }
//!
//!     fn save_deferred(&self, item: CacheItem<i32>) -> Result<bool> {
//!         self.save(item)
//!     }
//!
//!     fn commit(&self) -> Result<bool> {
//!         Ok(true)
//!     }
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! [`DynamicPool`] wraps any pool in a clonable, type-erased handle. Stores
//! that are shared between several owners (the members of a chain, the
//! fallback of a snapshot store) are passed around as dynamic pools.

mod dynamic;
pub mod error;
mod item;
mod key;
mod pool;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use dynamic::{DynamicPool, IntoDynamicPool};
#[doc(inline)]
pub use error::{Error, InvalidKeyError, Result};
#[doc(inline)]
pub use item::{CacheItem, Expiration};
#[doc(inline)]
pub use key::{RESERVED_CHARACTERS, validate_key};
#[doc(inline)]
pub use pool::ItemPool;
