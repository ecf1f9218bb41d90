/*!
 * IPC Types
 * Common types and the unified error for pipe IPC
 */

use crate::core::types::{Pid, Size, Tid};
use crate::memory::MemoryError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// IPC operation result
pub type IpcResult<T> = Result<T, IpcError>;

/// Channel identifier (process-wide unique, monotonically assigned)
pub type ChannelId = u32;

/// Index of an outpoint in the registry; stable because outpoints are never removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutpointId(pub usize);

/// Semantic type of a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeClass {
    Standard,
}

/// Second-level pipe tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipeSubclass {
    Out,
    In,
}

impl PipeClass {
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(Self::Standard),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u64 {
        match self {
            Self::Standard => 0,
        }
    }
}

impl PipeSubclass {
    pub fn from_raw(raw: u64) -> Option<Self> {
        match raw {
            0 => Some(Self::Out),
            1 => Some(Self::In),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u64 {
        match self {
            Self::Out => 0,
            Self::In => 1,
        }
    }
}

/// Unified IPC error type with miette diagnostics
///
/// Everything except `Integrity` is a validation failure reported to the
/// caller as `Fail`. `Integrity` means a queue invariant broke.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum IpcError {
    #[error("Process {0} not found")]
    #[diagnostic(code(ipc::process_not_found))]
    ProcessNotFound(Pid),

    #[error("Thread {tid} not found in process {pid}")]
    #[diagnostic(code(ipc::thread_not_found))]
    ThreadNotFound { pid: Pid, tid: Tid },

    #[error("No outpoint for {class:?}/{subclass:?} in process {pid}")]
    #[diagnostic(
        code(ipc::outpoint_not_found),
        help("The target process has not registered an outpoint of this class and subclass.")
    )]
    OutpointNotFound {
        pid: Pid,
        class: PipeClass,
        subclass: PipeSubclass,
    },

    #[error("Invalid max connections: {0}")]
    #[diagnostic(
        code(ipc::invalid_max_connections),
        help("Use a positive connection limit or the unlimited sentinel (-1).")
    )]
    InvalidMaxConnections(i32),

    #[error("Outpoint of process {pid} is full ({max} connections)")]
    #[diagnostic(code(ipc::outpoint_full))]
    OutpointFull { pid: Pid, max: i32 },

    #[error("Pipe not found: {0}")]
    #[diagnostic(code(ipc::channel_not_found))]
    ChannelNotFound(ChannelId),

    #[error("Permission denied: {0}")]
    #[diagnostic(
        code(ipc::permission_denied),
        help("Only the reader process may read a pipe and only the writer process may write it.")
    )]
    PermissionDenied(String),

    #[error("Invalid buffer size {requested} (max {max})")]
    #[diagnostic(code(ipc::invalid_buffer_size))]
    InvalidBufferSize { requested: Size, max: Size },

    #[error("Write of {requested} bytes can never fit a {capacity} byte pipe")]
    #[diagnostic(
        code(ipc::capacity_exceeded),
        help("A pipe of capacity C holds at most C - 1 bytes. Split the write or connect with a larger buffer.")
    )]
    CapacityExceeded { requested: Size, capacity: Size },

    #[error("Pipe ids exhausted")]
    #[diagnostic(code(ipc::channel_ids_exhausted))]
    ChannelIdsExhausted,

    #[error("Invalid request parameter: {0}")]
    #[diagnostic(code(ipc::invalid_parameter))]
    InvalidParameter(String),

    #[error("User memory error: {0}")]
    #[diagnostic(code(ipc::memory))]
    Memory(#[from] MemoryError),

    #[error("Kernel integrity fault: {0}")]
    #[diagnostic(
        code(ipc::integrity),
        help("A pipe queue invariant was violated. The affected operation was halted.")
    )]
    Integrity(String),
}

impl IpcError {
    /// Whether this error reflects broken kernel invariants rather than bad input
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            Self::Integrity(_) | Self::Memory(MemoryError::AccessAlreadyEnabled { .. })
        )
    }
}
