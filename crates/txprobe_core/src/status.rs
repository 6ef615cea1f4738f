//! Transaction status model.

use std::fmt;

/// Status of the ambient transaction coordinator.
///
/// These are the statuses a coordinator can report for the current
/// unit of work. The lifecycle helper only branches on
/// [`NoTransaction`](TxStatus::NoTransaction) and the rollback path;
/// every other status is treated as committable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TxStatus {
    /// No transaction is associated with the current context.
    #[default]
    NoTransaction,
    /// A transaction is in progress.
    Active,
    /// The transaction has been marked rollback-only.
    MarkedRollback,
    /// The transaction has been rolled back.
    RolledBack,
    /// The transaction is in the process of rolling back.
    RollingBack,
    /// The transaction has been committed.
    Committed,
    /// The transaction is preparing to commit.
    Preparing,
    /// The transaction has been prepared.
    Prepared,
    /// The transaction is in the process of committing.
    Committing,
    /// The coordinator cannot determine the transaction state.
    Unknown,
}

impl TxStatus {
    /// Returns true if finishing the transaction must roll back
    /// rather than commit.
    ///
    /// A rollback is issued for an already-rolling-back status too;
    /// coordinators are expected to tolerate the redundant call.
    #[must_use]
    pub const fn is_rollback_path(self) -> bool {
        matches!(
            self,
            Self::MarkedRollback | Self::RolledBack | Self::RollingBack
        )
    }

    /// Returns the status name used in log messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoTransaction => "no-transaction",
            Self::Active => "active",
            Self::MarkedRollback => "marked-rollback",
            Self::RolledBack => "rolled-back",
            Self::RollingBack => "rolling-back",
            Self::Committed => "committed",
            Self::Preparing => "preparing",
            Self::Prepared => "prepared",
            Self::Committing => "committing",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_path_statuses() {
        assert!(TxStatus::MarkedRollback.is_rollback_path());
        assert!(TxStatus::RolledBack.is_rollback_path());
        assert!(TxStatus::RollingBack.is_rollback_path());
    }

    #[test]
    fn committable_statuses_are_not_rollback_path() {
        for status in [
            TxStatus::NoTransaction,
            TxStatus::Active,
            TxStatus::Committed,
            TxStatus::Preparing,
            TxStatus::Prepared,
            TxStatus::Committing,
            TxStatus::Unknown,
        ] {
            assert!(!status.is_rollback_path(), "{status} misrouted");
        }
    }

    #[test]
    fn status_display() {
        assert_eq!(format!("{}", TxStatus::NoTransaction), "no-transaction");
        assert_eq!(format!("{}", TxStatus::MarkedRollback), "marked-rollback");
    }
}
