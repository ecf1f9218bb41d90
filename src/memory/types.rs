/*!
 * Memory Types
 * Common types for user memory access
 */

use crate::core::types::{Address, Pid, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum MemoryError {
    #[error("Out of user memory: requested {requested} bytes in PID {pid}")]
    #[diagnostic(
        code(memory::out_of_memory),
        help("The process address space is exhausted. Free unused buffers or raise KERNEL_USER_MEMORY_SIZE.")
    )]
    OutOfMemory { pid: Pid, requested: Size },

    #[error("Invalid memory address: 0x{0:x}")]
    #[diagnostic(code(memory::invalid_address))]
    InvalidAddress(Address),

    #[error("Access out of bounds: 0x{address:x}+{len} in PID {pid}")]
    #[diagnostic(
        code(memory::out_of_bounds),
        help("A user pointer plus length runs outside the process address space.")
    )]
    OutOfBounds { pid: Pid, address: Address, len: Size },

    #[error("Copy length {len} exceeds source ({src} bytes) or destination ({dst} bytes)")]
    #[diagnostic(code(memory::copy_overrun))]
    CopyOverrun { len: Size, src: Size, dst: Size },

    #[error("Cross-context access to PID {requested} while PID {current} is still mapped")]
    #[diagnostic(
        code(memory::access_already_enabled),
        help("Kernel integrity fault: an access bracket was not released before another was opened.")
    )]
    AccessAlreadyEnabled { current: Pid, requested: Pid },

    #[error("Cross-context access to PID {0} used after release")]
    #[diagnostic(code(memory::access_released))]
    AccessReleased(Pid),

    #[error("Malformed user structure at 0x{address:x}: {reason}")]
    #[diagnostic(code(memory::layout))]
    Layout { address: Address, reason: String },
}

/// Pointer into a process's address space
///
/// Only meaningful together with the process that owns it; 0 is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserPtr(pub u64);

impl UserPtr {
    pub const NULL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self(address as u64)
    }

    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub fn address(self) -> Address {
        self.0 as Address
    }

    /// Pointer `bytes` further into the same address space
    #[inline]
    #[must_use]
    pub fn offset(self, bytes: Size) -> Self {
        Self(self.0.saturating_add(bytes as u64))
    }
}

impl std::fmt::Display for UserPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl From<UserPtr> for u64 {
    fn from(ptr: UserPtr) -> Self {
        ptr.0
    }
}

impl From<u64> for UserPtr {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
