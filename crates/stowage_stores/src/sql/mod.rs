// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Relational table storage for the `pdo` driver.

#[cfg(feature = "sql")]
mod backend;
#[cfg(feature = "sql")]
mod connection;
mod options;

#[cfg(feature = "sql")]
pub use backend::SqlBackend;
#[cfg(feature = "sql")]
pub use connection::SqlConnection;
pub use options::SqlOptions;
