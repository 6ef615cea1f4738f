//! Error types for probe runs.

use thiserror::Error;
use txprobe_core::TxError;
use txprobe_store::StoreError;

/// Result type for probe runs.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that abort a probe run.
///
/// Probes log observations rather than asserting on them, so the only
/// failures here are infrastructure ones, surfaced unmodified.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Transaction lifecycle or coordinator failure.
    #[error("transaction error: {0}")]
    Tx(#[from] TxError),

    /// Store operation failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
