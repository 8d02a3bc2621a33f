// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::Deserialize;
use stowage_pool::{Error, Result};

/// Table and column names used by the SQL store.
///
/// Names are interpolated into statements, so [`validate`](Self::validate)
/// only admits plain identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqlOptions {
    /// Table holding the cache rows.
    pub db_table: String,
    /// Primary key column holding `namespace:key`.
    pub db_id_col: String,
    /// Column holding the encoded record.
    pub db_data_col: String,
    /// Column holding the lifetime in seconds, `NULL` for no expiry.
    pub db_lifetime_col: String,
    /// Column holding the write time in seconds since the Unix epoch.
    pub db_time_col: String,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            db_table: "cache_items".to_owned(),
            db_id_col: "item_id".to_owned(),
            db_data_col: "item_data".to_owned(),
            db_lifetime_col: "item_lifetime".to_owned(),
            db_time_col: "item_time".to_owned(),
        }
    }
}

impl SqlOptions {
    /// Checks that every name is a plain SQL identifier.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending option.
    ///
    /// # Examples
    ///
    /// ```
    /// use stowage_stores::SqlOptions;
    ///
    /// assert!(SqlOptions::default().validate().is_ok());
    ///
    /// let bad = SqlOptions { db_table: "items; DROP TABLE users".into(), ..SqlOptions::default() };
    /// assert!(bad.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        for (option, name) in [
            ("db_table", &self.db_table),
            ("db_id_col", &self.db_id_col),
            ("db_data_col", &self.db_data_col),
            ("db_lifetime_col", &self.db_lifetime_col),
            ("db_time_col", &self.db_time_col),
        ] {
            if !is_identifier(name) {
                return Err(Error::from_message(format!("`{option}` is not a valid SQL identifier: `{name}`")));
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
