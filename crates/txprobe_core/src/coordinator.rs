//! Ambient transaction coordinator abstraction.

use crate::error::TxResult;
use crate::status::TxStatus;
use std::sync::Arc;

/// The ambient transaction coordinator for the current process.
///
/// Coordinators track the currently active unit of work and expose the
/// narrow surface the lifecycle helper and the probed stores need:
/// status inspection, begin/commit/rollback, rollback-only marking, and
/// resource enlistment.
///
/// # Invariants
///
/// - `status` never mutates coordinator state
/// - `begin` succeeds only from [`TxStatus::NoTransaction`]
/// - enlisted participants receive exactly one `commit` or `rollback`
///   callback when the transaction resolves
/// - after a transaction resolves, the coordinator owns resetting
///   itself back to [`TxStatus::NoTransaction`]
///
/// # Implementors
///
/// - [`super::InMemoryCoordinator`] - process-local coordinator for
///   manual probe runs and tests
pub trait Coordinator: Send + Sync {
    /// Returns the current transaction status.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot report its state.
    fn status(&self) -> TxResult<TxStatus>;

    /// Starts a new transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already in progress or the
    /// coordinator rejects the begin.
    fn begin(&self) -> TxResult<()>;

    /// Durably finalizes all operations performed under the active
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no transaction to commit, or if the
    /// transaction was marked rollback-only (in which case it is rolled
    /// back instead).
    fn commit(&self) -> TxResult<()>;

    /// Discards all operations performed under the active transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no transaction to roll back.
    fn rollback(&self) -> TxResult<()>;

    /// Marks the active transaction so that the only possible outcome
    /// is a rollback.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active transaction.
    fn set_rollback_only(&self) -> TxResult<()>;

    /// Enlists a participant in the active transaction.
    ///
    /// The participant is notified exactly once when the transaction
    /// resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active transaction.
    fn enlist(&self, participant: Arc<dyn Participant>) -> TxResult<()>;
}

/// A resource enlisted in a transaction.
///
/// Stores buffer their writes while a transaction is active and apply
/// or discard the buffer from these callbacks. Callbacks must not call
/// back into the coordinator.
pub trait Participant: Send + Sync {
    /// Applies the participant's buffered work.
    fn commit(&self);

    /// Discards the participant's buffered work.
    fn rollback(&self);
}

/// Resolves the ambient coordinator for the current process.
///
/// This is the injected lookup mechanism the lifecycle helper uses for
/// lazy one-time resolution of its handle. Resolution may fail when the
/// environment is misconfigured; the failure propagates to the caller
/// unmodified.
pub trait CoordinatorLookup: Send + Sync {
    /// Resolves and returns the coordinator handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TxError::Lookup`] if no coordinator can be
    /// resolved.
    fn resolve(&self) -> TxResult<Arc<dyn Coordinator>>;
}

impl<F> CoordinatorLookup for F
where
    F: Fn() -> TxResult<Arc<dyn Coordinator>> + Send + Sync,
{
    fn resolve(&self) -> TxResult<Arc<dyn Coordinator>> {
        (self)()
    }
}
