/*!
 * Syscalls Module
 * Pipe IPC kernel calls: decoding, deferred completion and the kernel entry point
 */

pub mod deferred;
pub mod dispatcher;
pub mod kernel;
pub mod types;

// Re-export public API
pub use deferred::{DeferredCall, DeferredHandler, DeferredStats, DeferredWorker, Resolution};
pub use dispatcher::SyscallDispatcher;
pub use kernel::Kernel;
pub use types::{BootError, CallResult, CallReturn, DeferredError, SyscallNumber};
