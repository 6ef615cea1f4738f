//! Transaction lifecycle helper.

use crate::coordinator::{Coordinator, CoordinatorLookup};
use crate::error::TxResult;
use crate::status::TxStatus;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};

/// Status-aware begin/finish operations over a shared coordinator handle.
///
/// The helper centralizes the status-checking logic every probe needs, so
/// callers never double-begin or commit a transaction that is doomed to
/// roll back. It resolves its coordinator handle lazily, exactly once,
/// through the injected lookup; all callers sharing a lifecycle observe
/// the same handle.
///
/// Resolving the coordinator is expensive in the environments this tool
/// probes, so the handle is cached for the life of the helper rather
/// than re-resolved per call.
///
/// # Example
///
/// ```ignore
/// let lifecycle = TxLifecycle::new(lookup);
/// lifecycle.begin()?;
/// // ... store operations ...
/// lifecycle.finish()?;
/// ```
pub struct TxLifecycle {
    /// Injected resolution mechanism for the ambient coordinator.
    lookup: Box<dyn CoordinatorLookup>,
    /// Lazily resolved handle, created at most once.
    handle: OnceCell<Arc<dyn Coordinator>>,
}

impl TxLifecycle {
    /// Creates a lifecycle helper over the given coordinator lookup.
    ///
    /// The lookup is not invoked until the first operation needs the
    /// handle.
    pub fn new(lookup: impl CoordinatorLookup + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
            handle: OnceCell::new(),
        }
    }

    /// Returns the shared coordinator handle, resolving it on first use.
    ///
    /// Concurrent first callers race to exactly one resolution; every
    /// caller then observes the same handle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TxError::Lookup`] if the lookup cannot resolve a
    /// coordinator. A failed resolution is not cached, so a later call
    /// retries.
    pub fn handle(&self) -> TxResult<Arc<dyn Coordinator>> {
        self.handle
            .get_or_try_init(|| self.lookup.resolve())
            .cloned()
    }

    /// Starts a transaction if none is in progress.
    ///
    /// If the coordinator reports any status other than
    /// [`TxStatus::NoTransaction`], no transaction is started and a
    /// warning records the observed status. This guards against nested
    /// and double begins.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be resolved or the
    /// underlying begin call fails.
    pub fn begin(&self) -> TxResult<()> {
        let tx = self.handle()?;

        let status = tx.status()?;
        if status == TxStatus::NoTransaction {
            tx.begin()?;
            info!("transaction started");
        } else {
            warn!(%status, "transaction not started as coordinator already has one in this state");
        }
        Ok(())
    }

    /// Finishes the in-flight transaction, committing or rolling back
    /// depending on its status.
    ///
    /// - no transaction: nothing to finish, warns (finish without begin
    ///   is a programming error upstream)
    /// - rollback path (marked-rollback, rolled-back, rolling-back):
    ///   issues a rollback, warns with the observed status
    /// - anything else: issues a commit
    ///
    /// Committing a rollback-marked transaction fails at the
    /// coordinator, and rolling back a never-started one is a logic
    /// error, so the branch order here matters.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot be resolved or the
    /// underlying commit/rollback call fails.
    pub fn finish(&self) -> TxResult<()> {
        let tx = self.handle()?;

        let status = tx.status()?;
        match status {
            TxStatus::NoTransaction => {
                warn!("transaction cannot be finished as it was never started");
            }
            TxStatus::MarkedRollback | TxStatus::RolledBack | TxStatus::RollingBack => {
                warn!(%status, "going to roll back transaction due to its status");
                tx.rollback()?;
            }
            // Every remaining status is treated as committable. New
            // statuses must be routed here deliberately.
            TxStatus::Active
            | TxStatus::Committed
            | TxStatus::Preparing
            | TxStatus::Prepared
            | TxStatus::Committing
            | TxStatus::Unknown => {
                info!("committing transaction");
                tx.commit()?;
                info!("transaction committed");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TxLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxLifecycle")
            .field("resolved", &self.handle.get().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Participant;
    use crate::error::TxError;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Coordinator double with a scripted status and call counters.
    struct ScriptedCoordinator {
        status: Mutex<TxStatus>,
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
    }

    impl ScriptedCoordinator {
        fn with_status(status: TxStatus) -> Arc<Self> {
            Arc::new(Self {
                status: Mutex::new(status),
                begins: AtomicUsize::new(0),
                commits: AtomicUsize::new(0),
                rollbacks: AtomicUsize::new(0),
            })
        }
    }

    impl Coordinator for ScriptedCoordinator {
        fn status(&self) -> TxResult<TxStatus> {
            Ok(*self.status.lock())
        }

        fn begin(&self) -> TxResult<()> {
            self.begins.fetch_add(1, Ordering::SeqCst);
            *self.status.lock() = TxStatus::Active;
            Ok(())
        }

        fn commit(&self) -> TxResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            *self.status.lock() = TxStatus::NoTransaction;
            Ok(())
        }

        fn rollback(&self) -> TxResult<()> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            *self.status.lock() = TxStatus::NoTransaction;
            Ok(())
        }

        fn set_rollback_only(&self) -> TxResult<()> {
            *self.status.lock() = TxStatus::MarkedRollback;
            Ok(())
        }

        fn enlist(&self, _participant: Arc<dyn Participant>) -> TxResult<()> {
            Ok(())
        }
    }

    fn lifecycle_over(coordinator: Arc<ScriptedCoordinator>) -> TxLifecycle {
        let handle: Arc<dyn Coordinator> = coordinator;
        TxLifecycle::new(move || Ok(Arc::clone(&handle)))
    }

    #[test]
    fn begin_starts_transaction_when_none_in_progress() {
        let coordinator = ScriptedCoordinator::with_status(TxStatus::NoTransaction);
        let lifecycle = lifecycle_over(Arc::clone(&coordinator));

        lifecycle.begin().unwrap();

        assert_eq!(coordinator.begins.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.status().unwrap(), TxStatus::Active);
    }

    #[test]
    fn begin_is_noop_when_transaction_active() {
        let coordinator = ScriptedCoordinator::with_status(TxStatus::Active);
        let lifecycle = lifecycle_over(Arc::clone(&coordinator));

        lifecycle.begin().unwrap();

        assert_eq!(coordinator.begins.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn begin_is_noop_for_any_in_flight_status() {
        for status in [
            TxStatus::MarkedRollback,
            TxStatus::RolledBack,
            TxStatus::Committing,
            TxStatus::Unknown,
        ] {
            let coordinator = ScriptedCoordinator::with_status(status);
            let lifecycle = lifecycle_over(Arc::clone(&coordinator));

            lifecycle.begin().unwrap();

            assert_eq!(coordinator.begins.load(Ordering::SeqCst), 0, "{status}");
        }
    }

    #[test]
    fn finish_without_begin_touches_nothing() {
        let coordinator = ScriptedCoordinator::with_status(TxStatus::NoTransaction);
        let lifecycle = lifecycle_over(Arc::clone(&coordinator));

        lifecycle.finish().unwrap();

        assert_eq!(coordinator.commits.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn finish_rolls_back_marked_transaction() {
        let coordinator = ScriptedCoordinator::with_status(TxStatus::MarkedRollback);
        let lifecycle = lifecycle_over(Arc::clone(&coordinator));

        lifecycle.finish().unwrap();

        assert_eq!(coordinator.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.commits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn finish_rolls_back_rolling_back_transaction() {
        // Redundant rollback is issued on purpose; coordinators must
        // tolerate it.
        for status in [TxStatus::RolledBack, TxStatus::RollingBack] {
            let coordinator = ScriptedCoordinator::with_status(status);
            let lifecycle = lifecycle_over(Arc::clone(&coordinator));

            lifecycle.finish().unwrap();

            assert_eq!(coordinator.rollbacks.load(Ordering::SeqCst), 1, "{status}");
            assert_eq!(coordinator.commits.load(Ordering::SeqCst), 0, "{status}");
        }
    }

    #[test]
    fn finish_commits_active_transaction() {
        let coordinator = ScriptedCoordinator::with_status(TxStatus::Active);
        let lifecycle = lifecycle_over(Arc::clone(&coordinator));

        lifecycle.finish().unwrap();

        assert_eq!(coordinator.commits.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn begin_then_finish_round_trip() {
        let coordinator = ScriptedCoordinator::with_status(TxStatus::NoTransaction);
        let lifecycle = lifecycle_over(Arc::clone(&coordinator));

        lifecycle.begin().unwrap();
        lifecycle.finish().unwrap();

        assert_eq!(coordinator.begins.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.commits.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.rollbacks.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.status().unwrap(), TxStatus::NoTransaction);
    }

    #[test]
    fn handle_returns_same_instance_across_calls() {
        let coordinator = ScriptedCoordinator::with_status(TxStatus::NoTransaction);
        let lifecycle = lifecycle_over(coordinator);

        let first = lifecycle.handle().unwrap();
        let second = lifecycle.handle().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn concurrent_first_access_resolves_once() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let lookups_in_closure = Arc::clone(&lookups);
        let lifecycle = Arc::new(TxLifecycle::new(move || {
            lookups_in_closure.fetch_add(1, Ordering::SeqCst);
            let coordinator: Arc<dyn Coordinator> =
                ScriptedCoordinator::with_status(TxStatus::NoTransaction);
            Ok(coordinator)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                std::thread::spawn(move || lifecycle.handle().unwrap())
            })
            .map(|t| t.join().unwrap())
            .collect();

        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
    }

    #[test]
    fn lookup_failure_propagates() {
        let lifecycle =
            TxLifecycle::new(|| -> TxResult<Arc<dyn Coordinator>> {
                Err(TxError::lookup("no coordinator bound"))
            });

        let err = lifecycle.begin().unwrap_err();
        assert!(matches!(err, TxError::Lookup { .. }));
    }

    #[test]
    fn failed_lookup_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_closure = Arc::clone(&attempts);
        let lifecycle = TxLifecycle::new(move || -> TxResult<Arc<dyn Coordinator>> {
            if attempts_in_closure.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(TxError::lookup("transient"))
            } else {
                Ok(ScriptedCoordinator::with_status(TxStatus::NoTransaction))
            }
        });

        assert!(lifecycle.handle().is_err());
        assert!(lifecycle.handle().is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    fn committable_status() -> impl Strategy<Value = TxStatus> {
        prop_oneof![
            Just(TxStatus::Active),
            Just(TxStatus::Committed),
            Just(TxStatus::Preparing),
            Just(TxStatus::Prepared),
            Just(TxStatus::Committing),
            Just(TxStatus::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn finish_commits_every_committable_status(status in committable_status()) {
            let coordinator = ScriptedCoordinator::with_status(status);
            let lifecycle = lifecycle_over(Arc::clone(&coordinator));

            lifecycle.finish().unwrap();

            prop_assert_eq!(coordinator.commits.load(Ordering::SeqCst), 1);
            prop_assert_eq!(coordinator.rollbacks.load(Ordering::SeqCst), 0);
        }
    }
}
