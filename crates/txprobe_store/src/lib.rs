//! # txprobe Store
//!
//! In-process reconstructions of the three storage layers the probes
//! exercise:
//!
//! - [`ObjectCache`] - a namespaced, tree-addressed object cache with
//!   entry expiration
//! - [`Repository`] / [`Session`] - a content repository of typed nodes
//!   with session-local change sets
//! - [`UserDirectory`] / [`IntegrationCache`] - an identity directory
//!   and the cache layered over its query results
//!
//! ## Transactional behavior
//!
//! Every store enlists in the ambient transaction on its first write:
//! while a transaction is active, writes are buffered and only reach
//! the shared state when the transaction commits; a rollback discards
//! them. Reads through the writing handle see the buffered writes.
//! This is the behavior the probes exist to make observable.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod directory;
mod error;
mod path;
mod repository;

pub use cache::{CacheConfig, CacheValue, ObjectCache};
pub use directory::{IntegrationCache, User, UserDirectory, UserQuery, USER_QUERY_REGION};
pub use error::{StoreError, StoreResult};
pub use path::{CachePath, COMMON_NS_NODE, ROOT_NODE};
pub use repository::{Repository, Session, NT_FOLDER};
