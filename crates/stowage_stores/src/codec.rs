// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Serialize, de::DeserializeOwned};
use stowage_pool::{Error, Result};

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(Error::from_source)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    postcard::from_bytes(bytes).map_err(Error::from_source)
}
