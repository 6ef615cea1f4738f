//! Namespaced transactional object cache.

use crate::error::StoreResult;
use crate::path::CachePath;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;
use txprobe_core::{Coordinator, Participant, TxStatus};

/// Value stored in the object cache.
///
/// The cache holds heterogeneous objects; callers downcast on read.
/// Values are shared handles, so an object mutated after caching is
/// observed mutated on the next read.
pub type CacheValue = Arc<dyn Any + Send + Sync>;

/// Configuration for the object cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long entries stay visible. `None` disables expiration.
    pub expiration: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiration: Some(Duration::from_millis(50_000)),
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry expiration.
    #[must_use]
    pub const fn expiration(mut self, value: Option<Duration>) -> Self {
        self.expiration = value;
        self
    }
}

#[derive(Clone)]
struct Entry {
    value: CacheValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

enum PendingOp {
    Put { path: String, entry: Entry },
    RemoveSubtree { prefix: CachePath },
}

#[derive(Default)]
struct TxBuffer {
    enlisted: bool,
    ops: Vec<PendingOp>,
}

#[derive(Default)]
struct Shared {
    base: RwLock<HashMap<String, Entry>>,
    pending: Mutex<TxBuffer>,
}

impl Shared {
    fn apply(&self, op: &PendingOp) {
        match op {
            PendingOp::Put { path, entry } => {
                self.base.write().insert(path.clone(), entry.clone());
            }
            PendingOp::RemoveSubtree { prefix } => {
                self.base.write().retain(|path, _| !prefix.is_ancestor_of(path));
            }
        }
    }
}

struct CacheParticipant {
    shared: Arc<Shared>,
}

impl Participant for CacheParticipant {
    fn commit(&self) {
        let ops = {
            let mut pending = self.shared.pending.lock();
            pending.enlisted = false;
            std::mem::take(&mut pending.ops)
        };
        for op in &ops {
            self.shared.apply(op);
        }
    }

    fn rollback(&self) {
        let mut pending = self.shared.pending.lock();
        pending.enlisted = false;
        pending.ops.clear();
    }
}

/// A tree-addressed object cache that enlists in the ambient transaction.
///
/// While a transaction is active, writes are buffered and only become
/// visible to other readers when the transaction commits; a rollback
/// discards them. Reads made through the same cache handle see the
/// buffered writes (read-your-writes).
///
/// Entries carry an expiration stamp taken from [`CacheConfig`] at put
/// time and are treated as absent once expired.
pub struct ObjectCache {
    config: CacheConfig,
    coordinator: Arc<dyn Coordinator>,
    shared: Arc<Shared>,
}

impl ObjectCache {
    /// Creates a cache bound to the given coordinator.
    #[must_use]
    pub fn new(coordinator: Arc<dyn Coordinator>, config: CacheConfig) -> Self {
        Self {
            config,
            coordinator,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Stores a value at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be consulted or
    /// enlistment fails.
    pub fn put(&self, path: &CachePath, value: CacheValue) -> StoreResult<()> {
        let entry = Entry {
            value,
            expires_at: self.config.expiration.map(|ttl| Instant::now() + ttl),
        };
        self.write_op(PendingOp::Put {
            path: path.as_str().to_string(),
            entry,
        })?;
        trace!(%path, "object cached");
        Ok(())
    }

    /// Looks up the value at the given path.
    ///
    /// Pending writes of the active transaction are consulted before
    /// the committed state; expired entries read as absent.
    #[must_use]
    pub fn get(&self, path: &CachePath) -> Option<CacheValue> {
        let now = Instant::now();

        // Newest pending op for this path wins.
        {
            let pending = self.shared.pending.lock();
            for op in pending.ops.iter().rev() {
                match op {
                    PendingOp::Put { path: p, entry } if p == path.as_str() => {
                        return (!entry.is_expired(now)).then(|| Arc::clone(&entry.value));
                    }
                    PendingOp::RemoveSubtree { prefix } if prefix.is_ancestor_of(path.as_str()) => {
                        return None;
                    }
                    _ => {}
                }
            }
        }

        let base = self.shared.base.read();
        base.get(path.as_str())
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Drops the whole cache tree.
    ///
    /// Returns whether any entry was visible to be removed, which the
    /// probes log as the invalidation result.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be consulted or
    /// enlistment fails.
    pub fn invalidate_all(&self) -> StoreResult<bool> {
        let root = CachePath::root();
        let had_entries = self.contains_under(&root);
        self.write_op(PendingOp::RemoveSubtree { prefix: root })?;
        trace!(success = had_entries, "invalidating whole cache");
        Ok(had_entries)
    }

    /// Returns the number of committed entries, ignoring any pending
    /// transaction buffer.
    #[must_use]
    pub fn committed_len(&self) -> usize {
        self.shared.base.read().len()
    }

    fn contains_under(&self, prefix: &CachePath) -> bool {
        let in_pending = self
            .shared
            .pending
            .lock()
            .ops
            .iter()
            .any(|op| matches!(op, PendingOp::Put { path, .. } if prefix.is_ancestor_of(path)));
        in_pending
            || self
                .shared
                .base
                .read()
                .keys()
                .any(|path| prefix.is_ancestor_of(path))
    }

    fn write_op(&self, op: PendingOp) -> StoreResult<()> {
        let status = self.coordinator.status()?;
        if matches!(status, TxStatus::Active | TxStatus::MarkedRollback) {
            // Enlist before taking our own lock; participant callbacks
            // run under the coordinator lock and take our locks, so the
            // order must be coordinator first everywhere.
            let needs_enlist = !self.shared.pending.lock().enlisted;
            if needs_enlist {
                let participant: Arc<dyn Participant> = Arc::new(CacheParticipant {
                    shared: Arc::clone(&self.shared),
                });
                self.coordinator.enlist(participant)?;
                self.shared.pending.lock().enlisted = true;
            }
            self.shared.pending.lock().ops.push(op);
        } else {
            self.shared.apply(&op);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCache")
            .field("committed_len", &self.committed_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txprobe_core::InMemoryCoordinator;

    fn wiring() -> (Arc<InMemoryCoordinator>, ObjectCache) {
        let coordinator = Arc::new(InMemoryCoordinator::new());
        let handle: Arc<dyn Coordinator> = coordinator.clone();
        let cache = ObjectCache::new(handle, CacheConfig::default());
        (coordinator, cache)
    }

    fn value(n: u32) -> CacheValue {
        Arc::new(n)
    }

    fn read_u32(cache: &ObjectCache, path: &CachePath) -> Option<u32> {
        cache
            .get(path)
            .and_then(|v| v.downcast::<u32>().ok())
            .map(|v| *v)
    }

    #[test]
    fn put_then_get_outside_transaction() {
        let (_coordinator, cache) = wiring();
        let path = CachePath::entry(Some("ns"), "region", "k");

        cache.put(&path, value(7)).unwrap();

        assert_eq!(read_u32(&cache, &path), Some(7));
        assert_eq!(cache.committed_len(), 1);
    }

    #[test]
    fn miss_returns_none() {
        let (_coordinator, cache) = wiring();
        assert!(cache.get(&CachePath::entry(None, "region", "k")).is_none());
    }

    #[test]
    fn transactional_put_is_buffered_until_commit() {
        let (coordinator, cache) = wiring();
        let path = CachePath::entry(Some("ns"), "region", "k");

        coordinator.begin().unwrap();
        cache.put(&path, value(7)).unwrap();

        // Visible through this handle, not yet committed.
        assert_eq!(read_u32(&cache, &path), Some(7));
        assert_eq!(cache.committed_len(), 0);

        coordinator.commit().unwrap();

        assert_eq!(read_u32(&cache, &path), Some(7));
        assert_eq!(cache.committed_len(), 1);
    }

    #[test]
    fn rollback_discards_buffered_writes() {
        let (coordinator, cache) = wiring();
        let path = CachePath::entry(Some("ns"), "region", "k");

        coordinator.begin().unwrap();
        cache.put(&path, value(7)).unwrap();
        coordinator.rollback().unwrap();

        assert!(cache.get(&path).is_none());
        assert_eq!(cache.committed_len(), 0);
    }

    #[test]
    fn second_put_overwrites_first() {
        let (_coordinator, cache) = wiring();
        let path = CachePath::entry(Some("ns"), "region", "k");

        cache.put(&path, value(1)).unwrap();
        cache.put(&path, value(2)).unwrap();

        assert_eq!(read_u32(&cache, &path), Some(2));
    }

    #[test]
    fn invalidate_all_drops_committed_entries() {
        let (_coordinator, cache) = wiring();
        let path = CachePath::entry(Some("ns"), "region", "k");
        cache.put(&path, value(1)).unwrap();

        let had_entries = cache.invalidate_all().unwrap();

        assert!(had_entries);
        assert!(cache.get(&path).is_none());
        assert_eq!(cache.committed_len(), 0);
    }

    #[test]
    fn invalidate_all_on_empty_cache_reports_nothing_removed() {
        let (_coordinator, cache) = wiring();
        assert!(!cache.invalidate_all().unwrap());
    }

    #[test]
    fn transactional_invalidate_hides_entries_before_commit() {
        let (coordinator, cache) = wiring();
        let path = CachePath::entry(Some("ns"), "region", "k");
        cache.put(&path, value(1)).unwrap();

        coordinator.begin().unwrap();
        cache.invalidate_all().unwrap();

        // Hidden through this handle, still committed underneath.
        assert!(cache.get(&path).is_none());
        assert_eq!(cache.committed_len(), 1);

        coordinator.commit().unwrap();
        assert_eq!(cache.committed_len(), 0);
    }

    #[test]
    fn put_after_invalidate_in_same_transaction_wins() {
        let (coordinator, cache) = wiring();
        let path = CachePath::entry(Some("ns"), "region", "k");
        cache.put(&path, value(1)).unwrap();

        coordinator.begin().unwrap();
        cache.invalidate_all().unwrap();
        cache.put(&path, value(2)).unwrap();

        assert_eq!(read_u32(&cache, &path), Some(2));

        coordinator.commit().unwrap();
        assert_eq!(read_u32(&cache, &path), Some(2));
        assert_eq!(cache.committed_len(), 1);
    }

    #[test]
    fn expired_entries_read_as_absent() {
        let coordinator = Arc::new(InMemoryCoordinator::new());
        let handle: Arc<dyn Coordinator> = coordinator;
        let cache = ObjectCache::new(
            handle,
            CacheConfig::new().expiration(Some(Duration::ZERO)),
        );
        let path = CachePath::entry(Some("ns"), "region", "k");

        cache.put(&path, value(1)).unwrap();

        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn disabled_expiration_keeps_entries() {
        let coordinator = Arc::new(InMemoryCoordinator::new());
        let handle: Arc<dyn Coordinator> = coordinator;
        let cache = ObjectCache::new(handle, CacheConfig::new().expiration(None));
        let path = CachePath::entry(Some("ns"), "region", "k");

        cache.put(&path, value(1)).unwrap();

        assert_eq!(read_u32(&cache, &path), Some(1));
    }

    #[test]
    fn shared_value_mutations_visible_through_cache() {
        let (_coordinator, cache) = wiring();
        let path = CachePath::entry(Some("ns"), "region", "k");
        let object = Arc::new(Mutex::new(1u32));
        let cached_handle: CacheValue = object.clone();

        cache.put(&path, cached_handle).unwrap();
        *object.lock() = 2;

        let cached = cache
            .get(&path)
            .and_then(|v| v.downcast::<Mutex<u32>>().ok())
            .unwrap();
        assert_eq!(*cached.lock(), 2);
    }
}
