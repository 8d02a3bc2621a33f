// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use stowage_pool::{Error, Result};

/// Checks that `namespace` only uses `-+_.A-Za-z0-9`.
///
/// Namespaces end up in directory names, SQL ids and Redis keys, so they are
/// held to a stricter alphabet than keys. The empty namespace is allowed.
///
/// # Errors
///
/// Returns an error naming the first offending character.
///
/// # Examples
///
/// ```
/// use stowage_stores::validate_namespace;
///
/// assert!(validate_namespace("").is_ok());
/// assert!(validate_namespace("app.v2").is_ok());
/// assert!(validate_namespace("a/b").is_err());
/// ```
pub fn validate_namespace(namespace: &str) -> Result<()> {
    match namespace
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_' | '.')))
    {
        Some(c) => Err(Error::from_message(format!(
            "namespace `{namespace}` contains `{c}`, only -+_.A-Za-z0-9 are allowed"
        ))),
        None => Ok(()),
    }
}

/// Prefixes `key` with `namespace:` unless the namespace is empty.
pub(crate) fn qualify(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_owned()
    } else {
        format!("{namespace}:{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_skips_empty_namespace() {
        assert_eq!(qualify("", "k"), "k");
        assert_eq!(qualify("ns", "k"), "ns:k");
    }

    #[test]
    fn rejects_separator_characters() {
        for ns in ["a:b", "a b", "a/b", "ä"] {
            assert!(validate_namespace(ns).is_err(), "{ns} should be rejected");
        }
    }
}
