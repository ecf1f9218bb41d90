/*!
 * Pipe Types
 * Queue records, outcomes, statistics and buffer errors for pipes
 */

use super::super::types::{ChannelId, PipeClass, PipeSubclass};
use crate::core::types::{Pid, Size, Tid};
use crate::memory::MemoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of a read or write once it passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwResult {
    /// Non-blocking request that could not complete; it was unwound
    Error,
    /// Completed immediately; the caller's return slots are filled and it was woken
    Complete,
    /// Left in the channel queue; completes later from another thread's drain
    Queued,
}

/// A request waiting in one of a pipe's FIFO queues
///
/// Writers carry their requested length alongside the thread so the two can
/// never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedOp {
    pub thread: Tid,
    pub requested_len: Option<Size>,
}

impl QueuedOp {
    pub const fn read(thread: Tid) -> Self {
        Self {
            thread,
            requested_len: None,
        }
    }

    pub const fn write(thread: Tid, len: Size) -> Self {
        Self {
            thread,
            requested_len: Some(len),
        }
    }
}

/// Buffer-level failures; nothing is copied when one is returned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("pipe is empty")]
    Empty,

    #[error("pipe cannot take {requested} bytes now")]
    Full { requested: Size },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Pipe statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChannelStats {
    pub id: ChannelId,
    pub class: PipeClass,
    pub subclass: PipeSubclass,
    pub reader_pid: Pid,
    pub writer_pid: Pid,
    pub capacity: Size,
    pub data_available: Size,
    pub read_offset: Size,
    pub write_offset: Size,
    pub queued_readers: usize,
    pub queued_writers: usize,
}
