// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for pool operations.

/// An error from a pool operation.
///
/// This is an opaque error type that can wrap any underlying error from a
/// store implementation. Use [`std::error::Error::source()`] or
/// [`ohno::ErrorExt::find_source`] to access the underlying cause.
///
/// # Example
///
/// ```
/// use stowage_pool::Error;
///
/// let error = Error::from_message("operation failed");
/// ```
#[ohno::error]
pub struct Error {}

impl Error {
    /// Creates a new error from a message or any boxed error.
    ///
    /// # Examples
    ///
    /// ```
    /// use stowage_pool::Error;
    ///
    /// let error = Error::from_message("operation failed");
    /// assert!(error.to_string().contains("operation failed"));
    /// ```
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }

    /// Wraps an error raised by a backend crate.
    ///
    /// The wrapped error stays reachable through the source chain.
    ///
    /// # Examples
    ///
    /// ```
    /// use ohno::ErrorExt;
    /// use stowage_pool::Error;
    ///
    /// let io = std::io::Error::other("disk full");
    /// let error = Error::from_source(io);
    /// assert!(error.find_source::<std::io::Error>().is_some());
    /// ```
    pub fn from_source<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::caused_by(source)
    }
}

/// Raised when a key breaks the rules enforced by every pool.
///
/// Always reached through the source chain of an [`Error`].
#[ohno::error]
#[display("invalid cache key `{key}`")]
pub struct InvalidKeyError {
    key: String,
}

impl InvalidKeyError {
    /// Returns the rejected key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A specialized [`Result`] type for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
