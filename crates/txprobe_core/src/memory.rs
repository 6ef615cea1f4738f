//! In-memory transaction coordinator.

use crate::coordinator::{Coordinator, Participant};
use crate::error::{TxError, TxResult};
use crate::status::TxStatus;
use parking_lot::Mutex;
use std::sync::Arc;

/// A process-local transaction coordinator.
///
/// Stands in for the environment-provided transaction service when the
/// probes run outside a container: it tracks the status state machine,
/// notifies enlisted participants when the transaction resolves, and —
/// acting as the ambient environment — resets itself back to
/// [`TxStatus::NoTransaction`] once a transaction reaches a terminal
/// state.
///
/// # Thread Safety
///
/// The coordinator is shared behind `Arc` and serializes all state
/// changes through one internal lock. Participant callbacks run under
/// that lock and must not call back into the coordinator.
#[derive(Default)]
pub struct InMemoryCoordinator {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    status: TxStatus,
    participants: Vec<Arc<dyn Participant>>,
}

impl InMemoryCoordinator {
    /// Creates a new coordinator with no transaction in progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of participants enlisted in the current
    /// transaction.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.inner.lock().participants.len()
    }
}

impl Coordinator for InMemoryCoordinator {
    fn status(&self) -> TxResult<TxStatus> {
        Ok(self.inner.lock().status)
    }

    fn begin(&self) -> TxResult<()> {
        let mut inner = self.inner.lock();
        if inner.status != TxStatus::NoTransaction {
            return Err(TxError::transaction(format!(
                "cannot begin: transaction already in progress (status {})",
                inner.status
            )));
        }
        inner.status = TxStatus::Active;
        Ok(())
    }

    fn commit(&self) -> TxResult<()> {
        let mut inner = self.inner.lock();
        match inner.status {
            TxStatus::NoTransaction => {
                Err(TxError::transaction("cannot commit: no transaction in progress"))
            }
            status if status.is_rollback_path() => {
                // A rollback-marked transaction cannot commit; resolve
                // it the only way it can go.
                inner.resolve(false);
                Err(TxError::transaction(format!(
                    "transaction was in state {status} and has been rolled back"
                )))
            }
            TxStatus::Active => {
                inner.status = TxStatus::Committing;
                inner.resolve(true);
                Ok(())
            }
            status => Err(TxError::transaction(format!(
                "cannot commit from state {status}"
            ))),
        }
    }

    fn rollback(&self) -> TxResult<()> {
        let mut inner = self.inner.lock();
        match inner.status {
            TxStatus::NoTransaction => Err(TxError::transaction(
                "cannot roll back: no transaction in progress",
            )),
            // Rolling back an already-rolling-back transaction is
            // tolerated; callers issue redundant rollbacks on purpose.
            TxStatus::Active | TxStatus::MarkedRollback | TxStatus::RollingBack => {
                inner.status = TxStatus::RollingBack;
                inner.resolve(false);
                Ok(())
            }
            status => Err(TxError::transaction(format!(
                "cannot roll back from state {status}"
            ))),
        }
    }

    fn set_rollback_only(&self) -> TxResult<()> {
        let mut inner = self.inner.lock();
        match inner.status {
            TxStatus::Active | TxStatus::MarkedRollback => {
                inner.status = TxStatus::MarkedRollback;
                Ok(())
            }
            status => Err(TxError::transaction(format!(
                "cannot mark rollback-only from state {status}"
            ))),
        }
    }

    fn enlist(&self, participant: Arc<dyn Participant>) -> TxResult<()> {
        let mut inner = self.inner.lock();
        match inner.status {
            TxStatus::Active | TxStatus::MarkedRollback => {
                inner.participants.push(participant);
                Ok(())
            }
            status => Err(TxError::transaction(format!(
                "cannot enlist participant: no active transaction (status {status})"
            ))),
        }
    }
}

impl Inner {
    /// Notifies every participant exactly once and resets the
    /// coordinator to its idle state. Terminal statuses are transient
    /// here: the coordinator owns the reset back to no-transaction.
    fn resolve(&mut self, committed: bool) {
        let participants = std::mem::take(&mut self.participants);
        for participant in &participants {
            if committed {
                participant.commit();
            } else {
                participant.rollback();
            }
        }
        self.status = TxStatus::NoTransaction;
    }
}

impl std::fmt::Debug for InMemoryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("InMemoryCoordinator")
            .field("status", &inner.status)
            .field("participants", &inner.participants.len())
            .finish()
    }
}
