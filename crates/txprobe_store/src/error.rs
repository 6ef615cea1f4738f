//! Error types for the probed stores.

use thiserror::Error;
use txprobe_core::TxError;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Coordinator interaction failed.
    #[error("coordinator error: {0}")]
    Coordinator(#[from] TxError),

    /// A node addressed by path does not exist.
    #[error("no such node: {path}")]
    NoSuchNode {
        /// The path that was looked up.
        path: String,
    },

    /// A cached value did not have the expected type.
    #[error("unexpected value type cached at {path}")]
    UnexpectedValue {
        /// The cache path holding the value.
        path: String,
    },

    /// A user record was not found.
    #[error("no such user: {username}")]
    NoSuchUser {
        /// The username that was looked up.
        username: String,
    },
}

impl StoreError {
    /// Creates a no-such-node error.
    pub fn no_such_node(path: impl Into<String>) -> Self {
        Self::NoSuchNode { path: path.into() }
    }

    /// Creates an unexpected-value error.
    pub fn unexpected_value(path: impl Into<String>) -> Self {
        Self::UnexpectedValue { path: path.into() }
    }

    /// Creates a no-such-user error.
    pub fn no_such_user(username: impl Into<String>) -> Self {
        Self::NoSuchUser {
            username: username.into(),
        }
    }
}
