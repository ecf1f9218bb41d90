/*!
 * Core Types
 * Common types used across the kernel
 */

/// Process ID type
pub type Pid = u32;

/// Thread ID type (unique across the whole kernel)
pub type Tid = u32;

/// Address type for user memory operations
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// A (process, thread) pair naming one kernel thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadRef {
    pub pid: Pid,
    pub tid: Tid,
}

impl ThreadRef {
    #[inline]
    #[must_use]
    pub const fn new(pid: Pid, tid: Tid) -> Self {
        Self { pid, tid }
    }
}

impl std::fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.pid, self.tid)
    }
}
