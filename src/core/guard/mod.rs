/*!
 * RAII Resource Guards
 *
 * Scoped guards with automatic cleanup on every exit path.
 *
 * ## Guard Types
 *
 * - **MemoryAccessGuard**: a foreign process's address space mapped into the
 *   current kernel context; unmapped when the guard drops
 *
 * ## Example
 *
 * ```ignore
 * let guard = access.enable(&process)?;
 * let request: ReadRequest = guard.read_struct(ptr)?;
 * // Unmapped on drop, including early returns through `?`
 * ```
 */

mod memory;
mod traits;

pub use memory::MemoryAccessGuard;
pub use traits::{Guard, GuardDrop};

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    pub pid: Option<crate::core::types::Pid>,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            pid: None,
        }
    }

    #[inline]
    pub fn with_pid(mut self, pid: crate::core::types::Pid) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
