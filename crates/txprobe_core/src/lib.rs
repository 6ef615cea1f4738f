//! # txprobe Core
//!
//! Transaction status model, coordinator abstraction, and the
//! transaction lifecycle helper shared by every probe.
//!
//! ## Design Principles
//!
//! - The ambient coordinator is reached through the narrow
//!   [`Coordinator`] trait; this crate never owns transaction state
//!   beyond reading status for branching
//! - The lifecycle helper resolves its coordinator handle lazily,
//!   exactly once, through an injected [`CoordinatorLookup`]
//! - Failures from the coordinator propagate unmodified; there is no
//!   retry and no recovery here
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use txprobe_core::{Coordinator, InMemoryCoordinator, TxLifecycle};
//!
//! let coordinator = Arc::new(InMemoryCoordinator::new());
//! let handle: Arc<dyn Coordinator> = coordinator;
//! let lifecycle = TxLifecycle::new(move || Ok(Arc::clone(&handle)));
//!
//! lifecycle.begin().unwrap();
//! lifecycle.finish().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod coordinator;
mod error;
mod lifecycle;
mod memory;
mod status;

pub use coordinator::{Coordinator, CoordinatorLookup, Participant};
pub use error::{TxError, TxResult};
pub use lifecycle::TxLifecycle;
pub use memory::InMemoryCoordinator;
pub use status::TxStatus;

/// Crate version, surfaced by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
