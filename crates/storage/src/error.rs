//! Errors raised by credential stores.
//!
//! The authentication core cares about one distinction only: did the store
//! answer or not. Every variant other than [`StorageError::NotFound`] and
//! [`StorageError::Conflict`] is reported upstream as "store unavailable".
//!
//! # Example
//!
//! ```
//! use ordergate_storage::{StorageError, StorageResult};
//!
//! fn register(username: &str) -> StorageResult<()> {
//!     Err(StorageError::conflict(username))
//! }
//!
//! let err = register("alice").unwrap_err();
//! assert!(!err.is_transient());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// Shared, clonable error source.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for credential store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Credential store failure.
///
/// New variants may be added; match with a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No record exists for the user.
    #[error("no credential for user {username}")]
    NotFound {
        /// The username that was looked up.
        username: String,
    },

    /// The username is already registered.
    #[error("username {username} is already registered")]
    Conflict {
        /// The username that collided.
        username: String,
    },

    /// The store could not be reached.
    #[error("credential store unreachable: {message}")]
    Connection {
        /// What went wrong.
        message: String,
        /// Underlying driver or network error.
        #[source]
        source: Option<BoxError>,
    },

    /// The store answered with an error of its own.
    #[error("credential store failure: {message}")]
    Internal {
        /// What went wrong.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Option<BoxError>,
    },

    /// The store did not answer in time.
    #[error("credential store did not answer in time")]
    Timeout,
}

impl StorageError {
    /// A [`StorageError::NotFound`] for `username`.
    #[must_use]
    pub fn not_found(username: impl Into<String>) -> Self {
        Self::NotFound { username: username.into() }
    }

    /// A [`StorageError::Conflict`] for `username`.
    #[must_use]
    pub fn conflict(username: impl Into<String>) -> Self {
        Self::Conflict { username: username.into() }
    }

    /// A [`StorageError::Connection`] without a source.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// A [`StorageError::Internal`] without a source.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// A [`StorageError::Timeout`].
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Attaches `source` to a `Connection` or `Internal` error.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_source(self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        match self {
            Self::Connection { message, .. } => {
                Self::Connection { message, source: Some(Arc::new(source)) }
            },
            Self::Internal { message, .. } => Self::Internal { message, source: Some(Arc::new(source)) },
            other => other,
        }
    }

    /// Returns `true` when the store was unreachable (connection loss or
    /// timeout) rather than rejecting the request itself.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}
