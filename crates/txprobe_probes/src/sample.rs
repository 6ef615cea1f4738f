//! Stateful sample object cached by the probes.

use parking_lot::Mutex;
use std::fmt;

/// A very simple object holding some mutable state.
///
/// The probes cache a shared handle to a sample, mutate it afterwards,
/// and log what a subsequent cache read observes. Because cache values
/// are shared handles, the mutation shows through the cache.
#[derive(Debug)]
pub struct Sample {
    inner: Mutex<State>,
}

#[derive(Debug)]
struct State {
    size: i64,
    results: Vec<String>,
}

impl Sample {
    /// Creates a sample in its initial state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State {
                size: -1,
                results: Vec::new(),
            }),
        }
    }

    /// Advances the sample's state.
    pub fn mutate(&self) {
        let mut state = self.inner.lock();
        state.size += 2;
        state.results = vec![
            format!("entry-{}", state.size),
            format!("some string: {}", state.size),
        ];
    }

    /// Returns the current size.
    #[must_use]
    pub fn size(&self) -> i64 {
        self.inner.lock().size
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        // Include the address so distinct samples are tellable apart in
        // the log even when their state matches.
        write!(
            f,
            "sample@{:x} size={}, results={:?}",
            self as *const Self as usize, state.size, state.results
        )
    }
}
