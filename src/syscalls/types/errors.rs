/*!
 * Kernel Call Error Types
 * Failures of the deferred-call machinery and of kernel boot
 */

use miette::Diagnostic;
use thiserror::Error;

/// Deferred call completion failures
#[derive(Error, Debug, Diagnostic)]
pub enum DeferredError {
    #[error("Deferred call record pool exhausted ({capacity} records in use)")]
    #[diagnostic(
        code(deferred::pool_exhausted),
        help("Raise KERNEL_DEFERRED_POOL_SIZE or reduce the number of concurrently blocked calls.")
    )]
    PoolExhausted { capacity: usize },

    #[error("Deferred call worker is not running")]
    #[diagnostic(code(deferred::worker_stopped))]
    WorkerStopped,

    #[error("Failed to spawn deferred call worker")]
    #[diagnostic(code(deferred::spawn))]
    Spawn(#[source] std::io::Error),
}

impl DeferredError {
    /// Whether this error means a kernel invariant broke
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. } | Self::WorkerStopped)
    }
}

/// Kernel boot failures
#[derive(Error, Debug, Diagnostic)]
pub enum BootError {
    #[error("Inconsistent kernel configuration: {0}")]
    #[diagnostic(
        code(kernel::config),
        help("The default pipe buffer must be larger than one byte and no larger than the maximum, and the deferred pool must not be empty.")
    )]
    InvalidConfig(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Deferred(#[from] DeferredError),
}
