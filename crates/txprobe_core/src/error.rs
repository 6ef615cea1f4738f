//! Error types for txprobe core.

use thiserror::Error;

/// Result type for transaction operations.
pub type TxResult<T> = Result<T, TxError>;

/// Errors that can occur while driving the ambient transaction coordinator.
///
/// There is deliberately no recovery here: every failure from the
/// coordinator surfaces to the caller unmodified, and nothing is retried.
#[derive(Debug, Error)]
pub enum TxError {
    /// The ambient coordinator could not be resolved.
    #[error("coordinator lookup failed: {message}")]
    Lookup {
        /// Description of the lookup failure.
        message: String,
    },

    /// A begin, commit, or rollback call into the coordinator failed.
    #[error("transaction operation failed: {message}")]
    Transaction {
        /// Description of the failure.
        message: String,
    },
}

impl TxError {
    /// Creates a lookup error.
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::Lookup {
            message: message.into(),
        }
    }

    /// Creates a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }
}
