// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Serialize, de::DeserializeOwned};

/// Values that every store can hold.
///
/// Persistent stores serialize values, shared stores hand out clones, and
/// all of them cross threads. This trait is implemented for every type that
/// satisfies those bounds.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
