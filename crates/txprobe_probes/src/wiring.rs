//! Ready-made wiring of coordinator, stores, and probes.

use crate::directory::DirectoryCacheProbe;
use crate::object_cache::ObjectCacheProbe;
use crate::repository::RepositoryProbe;
use std::sync::Arc;
use txprobe_core::{Coordinator, InMemoryCoordinator, TxLifecycle};
use txprobe_store::{CacheConfig, IntegrationCache, ObjectCache, Repository, UserDirectory};

/// A full probe wiring over one in-memory coordinator.
///
/// Every store and every probe shares the same coordinator and the
/// same lifecycle helper, the way the probed environment shares one
/// ambient transaction service.
pub struct ProbeSet {
    coordinator: Arc<InMemoryCoordinator>,
    lifecycle: Arc<TxLifecycle>,
    /// Object cache probe.
    pub object_cache: ObjectCacheProbe,
    /// Content repository probe.
    pub repository: RepositoryProbe,
    /// Directory integration cache probe.
    pub directory_cache: DirectoryCacheProbe,
}

impl ProbeSet {
    /// Wires all probes over a fresh in-memory coordinator.
    #[must_use]
    pub fn in_memory(cache_config: CacheConfig) -> Self {
        let coordinator = Arc::new(InMemoryCoordinator::new());
        let handle: Arc<dyn Coordinator> = coordinator.clone();

        let lookup_handle = Arc::clone(&handle);
        let lifecycle = Arc::new(TxLifecycle::new(move || Ok(Arc::clone(&lookup_handle))));

        // The object cache probe owns its cache instance; the
        // integration cache sits on a separate one, as in the probed
        // deployment.
        let probe_cache = Arc::new(ObjectCache::new(Arc::clone(&handle), cache_config));
        let idm_cache = Arc::new(ObjectCache::new(Arc::clone(&handle), CacheConfig::default()));
        let repository = Arc::new(Repository::new(Arc::clone(&handle)));
        let directory = Arc::new(UserDirectory::new(Arc::clone(&handle)));
        let integration = Arc::new(IntegrationCache::new(idm_cache));

        Self {
            object_cache: ObjectCacheProbe::new(
                probe_cache,
                Arc::clone(&directory),
                Arc::clone(&lifecycle),
            ),
            repository: RepositoryProbe::new(repository, Arc::clone(&lifecycle)),
            directory_cache: DirectoryCacheProbe::new(
                directory,
                integration,
                Arc::clone(&lifecycle),
            ),
            coordinator,
            lifecycle,
        }
    }

    /// Returns the shared coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<InMemoryCoordinator> {
        &self.coordinator
    }

    /// Returns the shared lifecycle helper.
    #[must_use]
    pub fn lifecycle(&self) -> &Arc<TxLifecycle> {
        &self.lifecycle
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::in_memory(CacheConfig::default())
    }
}
