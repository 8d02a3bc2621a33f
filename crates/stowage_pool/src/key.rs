// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{Error, InvalidKeyError, Result};

/// Characters that may not appear in a cache key.
pub const RESERVED_CHARACTERS: &str = "{}()/\\@:";

/// Checks that `key` is usable by every store.
///
/// Keys must be non-empty and must not contain any of
/// [`RESERVED_CHARACTERS`].
///
/// # Errors
///
/// Returns an [`Error`] whose source is an [`InvalidKeyError`].
///
/// # Examples
///
/// ```
/// use stowage_pool::validate_key;
///
/// assert!(validate_key("user.42").is_ok());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("user:42").is_err());
/// ```
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::from_source(InvalidKeyError::caused_by(key, "key is empty")));
    }

    if let Some(reserved) = key.chars().find(|c| RESERVED_CHARACTERS.contains(*c)) {
        return Err(Error::from_source(InvalidKeyError::caused_by(
            key,
            format!("contains reserved character `{reserved}`"),
        )));
    }

    Ok(())
}
