/*!
 * IPC Kernel Library
 * Pipe-based inter-process communication core exposed as a library
 */

pub mod client;
pub mod core;
pub mod ipc;
pub mod memory;
pub mod monitoring;
pub mod process;
pub mod syscalls;

// Re-exports
pub use client::{BasicInpoint, BasicOutpoint, EndpointError, EndpointResult};
pub use core::{KernelConfig, Pid, Size, Tid};
pub use ipc::{
    ChannelDescriptor, ChannelId, ChannelStats, IpcError, IpcResult, OutpointStats, PipeClass,
    PipeManager, PipeSubclass,
};
pub use memory::{AddressSpace, MemoryError, UserPtr};
pub use monitoring::init_tracing;
pub use process::{Process, ProcessTable, Scheduler, Thread, ThreadState};
pub use syscalls::{BootError, CallResult, CallReturn, DeferredStats, Kernel, SyscallNumber};
