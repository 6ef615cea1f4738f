//! Identity directory and its query-result integration cache.

use crate::cache::{CacheValue, ObjectCache};
use crate::error::{StoreError, StoreResult};
use crate::path::CachePath;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use txprobe_core::{Coordinator, Participant, TxStatus};

/// Cache region holding user query results.
pub const USER_QUERY_REGION: &str = "user-query-list";

/// A user record in the identity directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Stable record id.
    pub id: uuid::Uuid,
    /// Login name, unique in the directory.
    pub username: String,
    /// Password (stored as given; this is a diagnostic tool).
    pub password: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Email address.
    pub email: String,
}

impl User {
    /// Creates a user record with a fresh id.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            username: username.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.username, self.email)
    }
}

/// A user search query.
///
/// Unset fields match everything. The normalized key form doubles as
/// the cache key for query results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// Username filter.
    pub username: Option<String>,
    /// Email filter.
    pub email: Option<String>,
}

impl UserQuery {
    /// Creates a query matching every user.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns the normalized cache key for this query.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!(
            "{}::{}",
            self.username.as_deref().unwrap_or("null"),
            self.email.as_deref().unwrap_or("null"),
        )
    }

    fn matches(&self, user: &User) -> bool {
        self.username.as_deref().is_none_or(|u| u == user.username)
            && self.email.as_deref().is_none_or(|e| e == user.email)
    }
}

enum PendingOp {
    Create(User),
    Remove(String),
}

#[derive(Default)]
struct TxBuffer {
    enlisted: bool,
    ops: Vec<PendingOp>,
}

#[derive(Default)]
struct Shared {
    users: RwLock<BTreeMap<String, User>>,
    pending: Mutex<TxBuffer>,
}

impl Shared {
    fn apply(&self, op: &PendingOp) {
        let mut users = self.users.write();
        match op {
            PendingOp::Create(user) => {
                users.insert(user.username.clone(), user.clone());
            }
            PendingOp::Remove(username) => {
                users.remove(username);
            }
        }
    }
}

struct DirectoryParticipant {
    shared: Arc<Shared>,
}

impl Participant for DirectoryParticipant {
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

/// The identity directory the probes create and remove users against.
///
/// Like the caches, the directory enlists in the ambient transaction:
/// user mutations are buffered while a transaction is active. Searches
/// made through the same handle see the buffered mutations.
pub struct UserDirectory {
    coordinator: Arc<dyn Coordinator>,
    shared: Arc<Shared>,
}

impl UserDirectory {
    /// Creates an empty directory bound to the given coordinator.
    #[must_use]
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        Self {
            coordinator,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be consulted or
    /// enlistment fails.
    pub fn create_user(&self, user: User) -> StoreResult<()> {
        trace!(username = %user.username, "creating user");
        self.write_op(PendingOp::Create(user))
    }

    /// Removes a user by username.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoSuchUser`] if the user is not visible,
    /// or a coordinator error.
    pub fn remove_user(&self, username: &str) -> StoreResult<()> {
        if !self.user_visible(username) {
            return Err(StoreError::no_such_user(username));
        }
        trace!(username, "removing user");
        self.write_op(PendingOp::Remove(username.to_string()))
    }

    /// Finds users matching the query.
    ///
    /// Buffered mutations of the active transaction are visible through
    /// this handle.
    #[must_use]
    pub fn find_users(&self, query: &UserQuery) -> Vec<User> {
        let mut result: BTreeMap<String, User> = self
            .shared
            .users
            .read()
            .values()
            .filter(|user| query.matches(user))
            .map(|user| (user.username.clone(), user.clone()))
            .collect();

        let pending = self.shared.pending.lock();
        for op in &pending.ops {
            match op {
                PendingOp::Create(user) if query.matches(user) => {
                    result.insert(user.username.clone(), user.clone());
                }
                PendingOp::Create(_) => {}
                PendingOp::Remove(username) => {
                    result.remove(username);
                }
            }
        }
        result.into_values().collect()
    }

    fn user_visible(&self, username: &str) -> bool {
        let mut visible = self.shared.users.read().contains_key(username);
        let pending = self.shared.pending.lock();
        for op in &pending.ops {
            match op {
                PendingOp::Create(user) if user.username == username => visible = true,
                PendingOp::Remove(name) if name == username => visible = false,
                _ => {}
            }
        }
        visible
    }

    fn write_op(&self, op: PendingOp) -> StoreResult<()> {
        let status = self.coordinator.status()?;
        if matches!(status, TxStatus::Active | TxStatus::MarkedRollback) {
            let needs_enlist = !self.shared.pending.lock().enlisted;
            if needs_enlist {
                let participant: Arc<dyn Participant> = Arc::new(DirectoryParticipant {
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

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("users", &self.shared.users.read().len())
            .finish_non_exhaustive()
    }
}

/// Caches user query results on top of the object cache.
///
/// Results are cached per namespace under the user-query region, keyed
/// by the normalized query string, mirroring how the identity
/// integration layer caches its lazy result lists.
pub struct IntegrationCache {
    cache: Arc<ObjectCache>,
}

impl IntegrationCache {
    /// Creates an integration cache over the given object cache.
    #[must_use]
    pub fn new(cache: Arc<ObjectCache>) -> Self {
        Self { cache }
    }

    /// Caches a query result list.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying cache write fails.
    pub fn put_user_query(
        &self,
        ns: Option<&str>,
        query: &UserQuery,
        users: Vec<User>,
    ) -> StoreResult<()> {
        let path = Self::query_path(ns, query);
        let value: CacheValue = Arc::new(users);
        self.cache.put(&path, value)?;
        trace!(%path, "user query list cached");
        Ok(())
    }

    /// Looks up a cached query result list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnexpectedValue`] if something other than
    /// a user list is cached at the query's path.
    pub fn get_user_query(
        &self,
        ns: Option<&str>,
        query: &UserQuery,
    ) -> StoreResult<Option<Arc<Vec<User>>>> {
        let path = Self::query_path(ns, query);
        match self.cache.get(&path) {
            None => Ok(None),
            Some(value) => {
                let users = value
                    .downcast::<Vec<User>>()
                    .map_err(|_| StoreError::unexpected_value(path.as_str()))?;
                trace!(%path, "user query list found in cache");
                Ok(Some(users))
            }
        }
    }

    /// Drops every cached query result.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying cache write fails.
    pub fn invalidate_all(&self) -> StoreResult<bool> {
        self.cache.invalidate_all()
    }

    fn query_path(ns: Option<&str>, query: &UserQuery) -> CachePath {
        CachePath::entry(ns, USER_QUERY_REGION, &query.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use txprobe_core::InMemoryCoordinator;

    fn wiring() -> (Arc<InMemoryCoordinator>, UserDirectory, IntegrationCache) {
        let coordinator = Arc::new(InMemoryCoordinator::new());
        let handle: Arc<dyn Coordinator> = coordinator.clone();
        let directory = UserDirectory::new(Arc::clone(&handle));
        let cache = Arc::new(ObjectCache::new(handle, CacheConfig::default()));
        (coordinator, directory, IntegrationCache::new(cache))
    }

    fn sample_user(username: &str) -> User {
        User::new(username, "password", "johny", "kikako", "johny@example.org")
    }

    #[test]
    fn create_and_find_users() {
        let (_coordinator, directory, _cache) = wiring();
        directory.create_user(sample_user("alice")).unwrap();
        directory.create_user(sample_user("bob")).unwrap();

        let users = directory.find_users(&UserQuery::all());
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "alice");
    }

    #[test]
    fn query_filters_by_username() {
        let (_coordinator, directory, _cache) = wiring();
        directory.create_user(sample_user("alice")).unwrap();
        directory.create_user(sample_user("bob")).unwrap();

        let query = UserQuery {
            username: Some("bob".to_string()),
            ..UserQuery::default()
        };
        let users = directory.find_users(&query);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "bob");
    }

    #[test]
    fn remove_missing_user_fails() {
        let (_coordinator, directory, _cache) = wiring();
        let result = directory.remove_user("ghost");
        assert!(matches!(result, Err(StoreError::NoSuchUser { .. })));
    }

    #[test]
    fn transactional_create_visible_through_handle_before_commit() {
        let (coordinator, directory, _cache) = wiring();

        coordinator.begin().unwrap();
        directory.create_user(sample_user("alice")).unwrap();

        assert_eq!(directory.find_users(&UserQuery::all()).len(), 1);

        coordinator.commit().unwrap();
        assert_eq!(directory.find_users(&UserQuery::all()).len(), 1);
    }

    #[test]
    fn rollback_discards_created_user() {
        let (coordinator, directory, _cache) = wiring();

        coordinator.begin().unwrap();
        directory.create_user(sample_user("alice")).unwrap();
        coordinator.rollback().unwrap();

        assert!(directory.find_users(&UserQuery::all()).is_empty());
    }

    #[test]
    fn transactional_remove_hides_user_before_commit() {
        let (coordinator, directory, _cache) = wiring();
        directory.create_user(sample_user("alice")).unwrap();

        coordinator.begin().unwrap();
        directory.remove_user("alice").unwrap();

        assert!(directory.find_users(&UserQuery::all()).is_empty());

        coordinator.commit().unwrap();
        assert!(directory.find_users(&UserQuery::all()).is_empty());
    }

    #[test]
    fn cache_key_is_normalized() {
        assert_eq!(UserQuery::all().cache_key(), "null::null");
        let query = UserQuery {
            username: Some("alice".to_string()),
            ..UserQuery::default()
        };
        assert_eq!(query.cache_key(), "alice::null");
    }

    #[test]
    fn integration_cache_round_trip() {
        let (_coordinator, _directory, cache) = wiring();
        let query = UserQuery::all();
        let users = vec![sample_user("alice")];

        assert!(cache.get_user_query(Some("realm"), &query).unwrap().is_none());

        cache
            .put_user_query(Some("realm"), &query, users.clone())
            .unwrap();

        let cached = cache.get_user_query(Some("realm"), &query).unwrap().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].username, "alice");
    }

    #[test]
    fn integration_cache_namespaces_are_isolated() {
        let (_coordinator, _directory, cache) = wiring();
        let query = UserQuery::all();
        cache
            .put_user_query(Some("a"), &query, vec![sample_user("alice")])
            .unwrap();

        assert!(cache.get_user_query(Some("b"), &query).unwrap().is_none());
    }

    #[test]
    fn integration_cache_invalidate_drops_results() {
        let (_coordinator, _directory, cache) = wiring();
        let query = UserQuery::all();
        cache
            .put_user_query(Some("realm"), &query, vec![sample_user("alice")])
            .unwrap();

        assert!(cache.invalidate_all().unwrap());
        assert!(cache.get_user_query(Some("realm"), &query).unwrap().is_none());
    }
}
