//! Directory integration cache probe.

use crate::error::ProbeResult;
use std::sync::Arc;
use tracing::info;
use txprobe_core::TxLifecycle;
use txprobe_store::{IntegrationCache, User, UserDirectory, UserQuery};

/// Namespace the probe caches query results under.
const PROBE_NS: &str = "idm_realm";

/// Exercises the identity directory's query-result cache across
/// transactions.
///
/// Each transaction refreshes the cached user list after mutating the
/// directory and logs what the cache returns, so stale-list behavior
/// across transaction boundaries is visible in the log.
pub struct DirectoryCacheProbe {
    directory: Arc<UserDirectory>,
    integration: Arc<IntegrationCache>,
    lifecycle: Arc<TxLifecycle>,
}

impl DirectoryCacheProbe {
    /// Creates the probe over its collaborators.
    #[must_use]
    pub fn new(
        directory: Arc<UserDirectory>,
        integration: Arc<IntegrationCache>,
        lifecycle: Arc<TxLifecycle>,
    ) -> Self {
        Self {
            directory,
            integration,
            lifecycle,
        }
    }

    /// Runs the four-transaction cache sequence.
    ///
    /// # Errors
    ///
    /// Returns an error only on infrastructure failure.
    pub fn run_transactional(&self) -> ProbeResult<()> {
        info!("starting the transactional directory cache probe");

        let query = UserQuery::all();

        // Transaction 1
        self.lifecycle.begin()?;

        let result = self.integration.get_user_query(Some(PROBE_NS), &query)?;
        info!("lookup before caching (expected none): {}", render(&result));

        self.refresh(&query)?;
        let result = self.integration.get_user_query(Some(PROBE_NS), &query)?;
        info!("first list returned: {}", render(&result));

        // Commit transaction 1. Start transaction 2.
        self.lifecycle.finish()?;
        self.lifecycle.begin()?;

        let user = User::new("chuanito", "password", "johny", "kikako", "johny@example.org");
        self.directory.create_user(user)?;

        self.refresh(&query)?;
        let result = self.integration.get_user_query(Some(PROBE_NS), &query)?;
        info!("second list returned (expected 1 user): {}", render(&result));

        // Commit transaction 2. Start transaction 3.
        self.lifecycle.finish()?;
        self.lifecycle.begin()?;

        self.directory.remove_user("chuanito")?;

        let live = self.directory.find_users(&query);
        info!("directory search after removal finds {} users", live.len());

        let result = self.integration.get_user_query(Some(PROBE_NS), &query)?;
        info!("third list returned (stale until refreshed): {}", render(&result));

        // Commit transaction 3. Start transaction 4.
        self.lifecycle.finish()?;
        self.lifecycle.begin()?;

        self.refresh(&query)?;
        let result = self.integration.get_user_query(Some(PROBE_NS), &query)?;
        info!("fourth list returned (expected empty): {}", render(&result));

        self.lifecycle.finish()?;
        Ok(())
    }

    /// Re-runs the directory search and caches the fresh result list.
    fn refresh(&self, query: &UserQuery) -> ProbeResult<()> {
        let users = self.directory.find_users(query);
        self.integration
            .put_user_query(Some(PROBE_NS), query, users)?;
        Ok(())
    }
}

fn render(result: &Option<Arc<Vec<User>>>) -> String {
    match result {
        Some(users) => format!(
            "[{}] ({} users)",
            users
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            users.len()
        ),
        None => "none".to_string(),
    }
}
