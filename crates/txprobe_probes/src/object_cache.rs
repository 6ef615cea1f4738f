//! Object cache probe.

use crate::error::ProbeResult;
use crate::sample::Sample;
use std::sync::Arc;
use tracing::{info, warn};
use txprobe_core::TxLifecycle;
use txprobe_store::{CachePath, CacheValue, ObjectCache, User, UserDirectory, UserQuery};

/// Namespace the probe stores its entries under.
const PROBE_NS: &str = "idm_realm";

/// Exercises the namespaced object cache in and out of transactions.
///
/// Results are logged for manual inspection; the interesting lines
/// carry the expected outcome so an operator can compare at a glance.
pub struct ObjectCacheProbe {
    cache: Arc<ObjectCache>,
    directory: Arc<UserDirectory>,
    lifecycle: Arc<TxLifecycle>,
}

impl ObjectCacheProbe {
    /// Creates the probe over its collaborators.
    #[must_use]
    pub fn new(
        cache: Arc<ObjectCache>,
        directory: Arc<UserDirectory>,
        lifecycle: Arc<TxLifecycle>,
    ) -> Self {
        Self {
            cache,
            directory,
            lifecycle,
        }
    }

    /// Runs the cache sequence with no transaction in play.
    ///
    /// # Errors
    ///
    /// Returns an error only on infrastructure failure; observations
    /// are logged, not asserted.
    pub fn run_direct(&self) -> ProbeResult<()> {
        info!("starting the direct object cache probe");

        let result = self.get_sample();
        info!("lookup before caching (expected none): {}", render(&result));

        let o1 = Arc::new(Sample::new());
        let o2 = Arc::new(Sample::new());
        info!("o1={o1}, o2={o2}");

        self.put_sample(&o1)?;
        o1.mutate();
        info!(
            "first object returned (expected o1): {}",
            render(&self.get_sample())
        );

        self.put_sample(&o2)?;
        o2.mutate();
        info!(
            "second object returned (expected o2): {}",
            render(&self.get_sample())
        );

        Ok(())
    }

    /// Runs the cache sequence across three transactions.
    ///
    /// # Errors
    ///
    /// Returns an error only on infrastructure failure.
    pub fn run_transactional(&self) -> ProbeResult<()> {
        info!("starting the transactional object cache probe");

        // Transaction 1
        self.lifecycle.begin()?;

        let result = self.get_sample();
        info!("lookup before caching (expected none): {}", render(&result));

        let o1 = Arc::new(Sample::new());
        let o2 = Arc::new(Sample::new());
        info!("o1={o1}, o2={o2}");

        self.put_sample(&o1)?;
        info!(
            "first object returned (expected o1): {}",
            render(&self.get_sample())
        );

        // Commit transaction 1. Start transaction 2.
        self.lifecycle.finish()?;
        self.lifecycle.begin()?;

        let removed = self.cache.invalidate_all()?;
        info!(removed, "cache invalidated");
        info!(
            "object returned after invalidation (expected none): {}",
            render(&self.get_sample())
        );

        // Touch the directory inside the same transaction; the
        // inconsistency this probe chases shows up when another store
        // shares the transaction.
        self.create_sample_user("chuann");

        self.put_sample(&o2)?;
        o2.mutate();
        info!(
            "second object returned (expected o2): {}",
            render(&self.get_sample())
        );

        // Commit transaction 2. Start transaction 3.
        self.lifecycle.finish()?;
        self.lifecycle.begin()?;

        info!(
            "third object returned (expected o2): {}",
            render(&self.get_sample())
        );

        self.lifecycle.finish()?;
        Ok(())
    }

    fn entry_path() -> CachePath {
        CachePath::entry(
            Some(PROBE_NS),
            txprobe_store::USER_QUERY_REGION,
            &UserQuery::all().cache_key(),
        )
    }

    fn put_sample(&self, sample: &Arc<Sample>) -> ProbeResult<()> {
        let value: CacheValue = sample.clone();
        self.cache.put(&Self::entry_path(), value)?;
        Ok(())
    }

    fn get_sample(&self) -> Option<Arc<Sample>> {
        self.cache
            .get(&Self::entry_path())
            .and_then(|value| value.downcast::<Sample>().ok())
    }

    fn create_sample_user(&self, username: &str) {
        let user = User::new(username, "password", "johny", "kikako", "johny@example.org");
        if let Err(error) = self.directory.create_user(user) {
            warn!(%error, username, "failed to create sample user");
        }
    }
}

fn render(sample: &Option<Arc<Sample>>) -> String {
    match sample {
        Some(sample) => sample.to_string(),
        None => "none".to_string(),
    }
}
