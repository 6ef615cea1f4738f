//! Content repository with transaction-enlisted sessions.

use crate::error::{StoreError, StoreResult};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use txprobe_core::{Coordinator, Participant, TxStatus};

/// Node type for plain folder nodes.
pub const NT_FOLDER: &str = "folder";

enum PendingChange {
    Add { path: String, node_type: String },
    Remove { path: String },
}

#[derive(Default)]
struct TxBuffer {
    enlisted: bool,
    changes: Vec<PendingChange>,
}

#[derive(Default)]
struct Shared {
    /// Committed nodes: path -> node type. The root node always exists.
    nodes: RwLock<BTreeMap<String, String>>,
    pending: Mutex<TxBuffer>,
}

impl Shared {
    fn apply(&self, change: &PendingChange) {
        let mut nodes = self.nodes.write();
        match change {
            PendingChange::Add { path, node_type } => {
                nodes.insert(path.clone(), node_type.clone());
            }
            PendingChange::Remove { path } => {
                let prefix = format!("{path}/");
                nodes.retain(|p, _| p != path && !p.starts_with(&prefix));
            }
        }
    }
}

struct RepositoryParticipant {
    shared: Arc<Shared>,
}

impl Participant for RepositoryParticipant {
    fn commit(&self) {
        let changes = {
            let mut pending = self.shared.pending.lock();
            pending.enlisted = false;
            std::mem::take(&mut pending.changes)
        };
        for change in &changes {
            self.shared.apply(change);
        }
    }

    fn rollback(&self) {
        let mut pending = self.shared.pending.lock();
        pending.enlisted = false;
        pending.changes.clear();
    }
}

/// A content repository of typed nodes addressed by path.
///
/// Sessions opened against the repository accumulate changes locally
/// until saved. A save performed while a transaction is active is
/// buffered with the transaction and only reaches the shared node tree
/// on commit — which is exactly the visibility boundary the repository
/// probe exists to demonstrate: queries read the shared tree, so a
/// saved-but-uncommitted node does not show up in query results.
pub struct Repository {
    coordinator: Arc<dyn Coordinator>,
    shared: Arc<Shared>,
}

impl Repository {
    /// Creates an empty repository containing only the root node.
    #[must_use]
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        let shared = Shared::default();
        shared
            .nodes
            .write()
            .insert("/".to_string(), NT_FOLDER.to_string());
        Self {
            coordinator,
            shared: Arc::new(shared),
        }
    }

    /// Opens a session on the given workspace.
    #[must_use]
    pub fn session(&self, workspace: &str) -> Session {
        debug!(workspace, "repository session opened");
        Session {
            coordinator: Arc::clone(&self.coordinator),
            shared: Arc::clone(&self.shared),
            workspace: workspace.to_string(),
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Counts committed nodes of the given type under a path prefix.
    ///
    /// This reads the shared node tree only: changes buffered in an
    /// open session or in the active transaction are not counted.
    #[must_use]
    pub fn query_children(&self, prefix: &str, node_type: &str) -> usize {
        let base = prefix.trim_end_matches('/');
        let wanted = format!("{base}/");
        self.shared
            .nodes
            .read()
            .iter()
            .filter(|(path, ty)| {
                path.as_str() != "/" && path.starts_with(&wanted) && ty.as_str() == node_type
            })
            .count()
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("nodes", &self.shared.nodes.read().len())
            .finish_non_exhaustive()
    }
}

/// A unit of unsaved repository changes.
///
/// The session sees its own unsaved changes; the shared tree does not
/// until [`Session::save`] runs (and, inside a transaction, until that
/// transaction commits).
pub struct Session {
    coordinator: Arc<dyn Coordinator>,
    shared: Arc<Shared>,
    workspace: String,
    added: Vec<(String, String)>,
    removed: Vec<String>,
}

impl Session {
    /// Returns the workspace this session was opened on.
    #[must_use]
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// Returns true if the node exists in this session's view.
    #[must_use]
    pub fn has_node(&self, path: &str) -> bool {
        if self.removed.iter().any(|p| p == path) {
            return false;
        }
        if self.added.iter().any(|(p, _)| p == path) {
            return true;
        }
        self.shared.nodes.read().contains_key(path)
    }

    /// Adds a child node under an existing parent.
    ///
    /// Returns the new node's path. The node stays session-local until
    /// saved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoSuchNode`] if the parent is not visible
    /// to this session.
    pub fn add_node(&mut self, parent: &str, name: &str, node_type: &str) -> StoreResult<String> {
        if !self.has_node(parent) {
            return Err(StoreError::no_such_node(parent));
        }
        let path = if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        };
        self.removed.retain(|p| p != &path);
        self.added.push((path.clone(), node_type.to_string()));
        Ok(path)
    }

    /// Marks a node for removal on the next save.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoSuchNode`] if the node is not visible to
    /// this session.
    pub fn remove_node(&mut self, path: &str) -> StoreResult<()> {
        if !self.has_node(path) {
            return Err(StoreError::no_such_node(path));
        }
        self.added.retain(|(p, _)| p != path);
        self.removed.push(path.to_string());
        Ok(())
    }

    /// Saves this session's changes.
    ///
    /// Outside a transaction the changes reach the shared tree
    /// immediately. Inside one they are buffered with the transaction
    /// and applied on commit or discarded on rollback.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be consulted or
    /// enlistment fails.
    pub fn save(&mut self) -> StoreResult<()> {
        let changes: Vec<PendingChange> = self
            .removed
            .drain(..)
            .map(|path| PendingChange::Remove { path })
            .chain(
                self.added
                    .drain(..)
                    .map(|(path, node_type)| PendingChange::Add { path, node_type }),
            )
            .collect();
        if changes.is_empty() {
            return Ok(());
        }

        let status = self.coordinator.status()?;
        if matches!(status, TxStatus::Active | TxStatus::MarkedRollback) {
            let needs_enlist = !self.shared.pending.lock().enlisted;
            if needs_enlist {
                let participant: Arc<dyn Participant> = Arc::new(RepositoryParticipant {
                    shared: Arc::clone(&self.shared),
                });
                self.coordinator.enlist(participant)?;
                self.shared.pending.lock().enlisted = true;
            }
            self.shared.pending.lock().changes.extend(changes);
        } else {
            for change in &changes {
                self.shared.apply(change);
            }
        }
        Ok(())
    }

    /// Closes the session, discarding unsaved changes.
    pub fn logout(self) {
        if !self.added.is_empty() || !self.removed.is_empty() {
            debug!(
                workspace = %self.workspace,
                unsaved = self.added.len() + self.removed.len(),
                "session closed with unsaved changes"
            );
        }
    }
}
