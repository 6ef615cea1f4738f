//! Content repository probe.

use crate::error::ProbeResult;
use std::sync::Arc;
use tracing::info;
use txprobe_core::TxLifecycle;
use txprobe_store::{Repository, Session, NT_FOLDER};

/// Workspace the probe operates in.
const WORKSPACE: &str = "portal-work";

/// Exercises repository sessions in and out of transactions.
///
/// The transactional run demonstrates the visibility quirk this probe
/// was written for: a node saved inside a transaction does not show up
/// in query results until the transaction commits, and a node removed
/// inside one keeps showing up until commit.
pub struct RepositoryProbe {
    repository: Arc<Repository>,
    lifecycle: Arc<TxLifecycle>,
}

impl RepositoryProbe {
    /// Creates the probe over its collaborators.
    #[must_use]
    pub fn new(repository: Arc<Repository>, lifecycle: Arc<TxLifecycle>) -> Self {
        Self {
            repository,
            lifecycle,
        }
    }

    /// Runs the session sequence with no transaction in play.
    ///
    /// # Errors
    ///
    /// Returns an error only on infrastructure failure.
    pub fn run_direct(&self) -> ProbeResult<()> {
        info!("starting the direct repository probe");

        let mut session = self.repository.session(WORKSPACE);
        let test_node = Self::ensure_test_node(&mut session)?;

        let node = session.add_node(&test_node, "a", NT_FOLDER)?;
        info!("node '{node}' created in workspace");
        session.save()?;
        info!("session saved");

        // New node is in the results, as expected.
        self.run_query();

        session.remove_node(&node)?;
        info!("node '{node}' deleted from workspace");
        session.save()?;
        info!("session saved");

        // Node was deleted and is not in the results anymore.
        self.run_query();

        session.logout();
        Ok(())
    }

    /// Runs the session sequence across three transactions.
    ///
    /// # Errors
    ///
    /// Returns an error only on infrastructure failure.
    pub fn run_transactional(&self) -> ProbeResult<()> {
        info!("starting the transactional repository probe");

        // Transaction 1
        self.lifecycle.begin()?;

        let mut session = self.repository.session(WORKSPACE);
        let test_node = Self::ensure_test_node(&mut session)?;

        let node = session.add_node(&test_node, "a", NT_FOLDER)?;
        info!("node '{node}' created in workspace");
        session.save()?;
        info!("session saved");

        // The new node is NOT in the results yet, even though it was
        // saved in this very transaction.
        self.run_query();

        // Commit transaction 1. Start transaction 2.
        self.lifecycle.finish()?;
        self.lifecycle.begin()?;

        // Now the node is covered in the results.
        self.run_query();

        session.remove_node(&node)?;
        info!("node '{node}' deleted from workspace");
        session.save()?;
        info!("session saved");

        // The node is still in the results, even though it was deleted
        // in this transaction.
        self.run_query();

        // Commit transaction 2. Start transaction 3.
        self.lifecycle.finish()?;
        self.lifecycle.begin()?;

        // Now the node is gone, as expected.
        self.run_query();

        self.lifecycle.finish()?;

        session.logout();
        Ok(())
    }

    /// Saves a node inside a transaction that is then marked
    /// rollback-only, so finishing takes the rollback path and the
    /// save never becomes visible.
    ///
    /// # Errors
    ///
    /// Returns an error only on infrastructure failure.
    pub fn run_rollback(&self) -> ProbeResult<()> {
        info!("starting the repository rollback probe");

        self.lifecycle.begin()?;

        let mut session = self.repository.session(WORKSPACE);
        let test_node = Self::ensure_test_node(&mut session)?;

        let node = session.add_node(&test_node, "a", NT_FOLDER)?;
        info!("node '{node}' created in workspace");

        self.lifecycle.handle()?.set_rollback_only()?;

        session.save()?;
        info!("session saved");

        // Status is now marked-rollback, so this rolls back.
        self.lifecycle.finish()?;

        info!(
            "subnodes after rollback (expected 0): {}",
            self.repository.query_children("/test", NT_FOLDER)
        );

        session.logout();
        Ok(())
    }

    fn ensure_test_node(session: &mut Session) -> ProbeResult<String> {
        if session.has_node("/test") {
            Ok("/test".to_string())
        } else {
            Ok(session.add_node("/", "test", NT_FOLDER)?)
        }
    }

    fn run_query(&self) {
        let count = self.repository.query_children("/test", NT_FOLDER);
        info!("number of subnodes of node '/test': {count}");
    }
}
