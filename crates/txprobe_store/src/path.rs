//! Tree addressing for the namespaced object cache.

use std::fmt;

/// Root node under which every cache entry lives.
pub const ROOT_NODE: &str = "object-cache-root";

/// Namespace node used when no namespace is given.
pub const COMMON_NS_NODE: &str = "common-ns";

/// Canonical path of a node in the object cache tree.
///
/// Paths have the shape `/root/namespace/region/key`. Namespaces are
/// sanitized so they occupy exactly one path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachePath(String);

impl CachePath {
    /// Returns the root path of the cache tree.
    #[must_use]
    pub fn root() -> Self {
        Self(format!("/{ROOT_NODE}"))
    }

    /// Returns the path of a namespace node.
    ///
    /// A missing namespace maps to the common namespace node. Slashes
    /// inside a namespace are replaced so the namespace stays a single
    /// path segment.
    #[must_use]
    pub fn namespaced(ns: Option<&str>) -> Self {
        let namespace = ns.unwrap_or(COMMON_NS_NODE).replace('/', "_");
        Self(format!("/{ROOT_NODE}/{namespace}"))
    }

    /// Returns the path of an entry under a namespace and region.
    #[must_use]
    pub fn entry(ns: Option<&str>, region: &str, key: &str) -> Self {
        Self(format!("{}/{region}/{key}", Self::namespaced(ns)))
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if `other` is this path or lives underneath it.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &str) -> bool {
        other == self.0 || other.starts_with(&format!("{}/", self.0))
    }
}

impl fmt::Display for CachePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
