/*!
 * Pipe Implementation
 *
 * Core channel data structure: a fixed-capacity buffer holding one contiguous
 * region of available data, plus the FIFO queues of blocked readers and
 * writers. Nothing here blocks or schedules; that is the manager's job.
 */

use super::super::types::{ChannelId, OutpointId, PipeClass, PipeSubclass};
use super::types::{BufferError, ChannelStats, QueuedOp};
use crate::core::limits::PIPE_BUFFER_MARGIN;
use crate::core::types::{Pid, Size, Tid};
use crate::memory::copy;
use std::collections::VecDeque;

pub struct Pipe {
    pub id: ChannelId,
    /// Write side: the outpoint this channel was connected through
    pub outpoint: OutpointId,
    pub class: PipeClass,
    pub subclass: PipeSubclass,
    pub reader_pid: Pid,
    pub writer_pid: Pid,
    buffer: Vec<u8>,
    data_available: Size,
    read_offset: Size,
    write_offset: Size,
    read_queue: VecDeque<QueuedOp>,
    write_queue: VecDeque<QueuedOp>,
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("id", &self.id)
            .field("reader_pid", &self.reader_pid)
            .field("writer_pid", &self.writer_pid)
            .field("capacity", &self.capacity())
            .field("data_available", &self.data_available)
            .field("read_offset", &self.read_offset)
            .field("write_offset", &self.write_offset)
            .field("queued_readers", &self.read_queue.len())
            .field("queued_writers", &self.write_queue.len())
            .finish()
    }
}

impl Pipe {
    pub fn new(
        id: ChannelId,
        outpoint: OutpointId,
        class: PipeClass,
        subclass: PipeSubclass,
        reader_pid: Pid,
        writer_pid: Pid,
        capacity: Size,
    ) -> Self {
        Self {
            id,
            outpoint,
            class,
            subclass,
            reader_pid,
            writer_pid,
            buffer: vec![0; capacity],
            data_available: 0,
            read_offset: 0,
            write_offset: 0,
            read_queue: VecDeque::new(),
            write_queue: VecDeque::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> Size {
        self.buffer.len()
    }

    #[inline]
    pub fn data_available(&self) -> Size {
        self.data_available
    }

    #[inline]
    pub fn offsets(&self) -> (Size, Size) {
        (self.read_offset, self.write_offset)
    }

    #[inline]
    pub fn can_read(&self) -> bool {
        self.data_available > 0
    }

    /// A write must start a fresh fill (no partially read data) and leave
    /// the last byte of the buffer unused.
    #[inline]
    pub fn can_write(&self, len: Size) -> bool {
        self.read_offset == 0
            && len
                .checked_add(self.write_offset)
                .is_some_and(|end| end < self.capacity())
    }

    /// Whether a write of `len` bytes could ever be accepted by this pipe
    #[inline]
    pub fn fits(&self, len: Size) -> bool {
        len.saturating_add(PIPE_BUFFER_MARGIN) <= self.capacity()
    }

    /// Copy up to `max_len` available bytes into `dst[offset..]`
    pub fn read(&mut self, dst: &mut [u8], offset: Size, max_len: Size) -> Result<Size, BufferError> {
        if !self.can_read() {
            return Err(BufferError::Empty);
        }

        let len = self.data_available.min(max_len);
        let target = dst.get_mut(offset..).unwrap_or_default();
        let source = &self.buffer[self.read_offset..self.read_offset + len];
        copy(target, source, len)?;

        self.read_offset += len;
        self.data_available -= len;
        if self.data_available == 0 {
            self.read_offset = 0;
            self.write_offset = 0;
        }
        Ok(len)
    }

    /// Copy exactly `len` bytes from `src[offset..]`, or nothing at all
    pub fn write(&mut self, src: &[u8], offset: Size, len: Size) -> Result<(), BufferError> {
        if !self.can_write(len) {
            return Err(BufferError::Full { requested: len });
        }

        let source = src.get(offset..).unwrap_or_default();
        let start = self.write_offset;
        copy(&mut self.buffer[start..start + len], source, len)?;

        self.write_offset += len;
        self.read_offset = 0;
        self.data_available += len;
        Ok(())
    }

    // Queue operations

    pub fn enqueue_read(&mut self, thread: Tid) {
        self.read_queue.push_back(QueuedOp::read(thread));
    }

    pub fn enqueue_write(&mut self, thread: Tid, size: Size) {
        self.write_queue.push_back(QueuedOp::write(thread, size));
    }

    pub fn peek_read(&self) -> Option<QueuedOp> {
        self.read_queue.front().copied()
    }

    pub fn peek_write(&self) -> Option<QueuedOp> {
        self.write_queue.front().copied()
    }

    pub fn dequeue_read(&mut self) -> Option<QueuedOp> {
        self.read_queue.pop_front()
    }

    pub fn dequeue_write(&mut self) -> Option<QueuedOp> {
        self.write_queue.pop_front()
    }

    /// Unwind the most recent read request
    pub fn remove_last_read(&mut self) -> Option<QueuedOp> {
        self.read_queue.pop_back()
    }

    /// Unwind the most recent write request
    pub fn remove_last_write(&mut self) -> Option<QueuedOp> {
        self.write_queue.pop_back()
    }

    pub fn is_read_queued(&self, thread: Tid) -> bool {
        self.read_queue.iter().any(|op| op.thread == thread)
    }

    pub fn is_write_queued(&self, thread: Tid) -> bool {
        self.write_queue.iter().any(|op| op.thread == thread)
    }

    pub fn queued_readers(&self) -> usize {
        self.read_queue.len()
    }

    pub fn queued_writers(&self) -> usize {
        self.write_queue.len()
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            id: self.id,
            class: self.class,
            subclass: self.subclass,
            reader_pid: self.reader_pid,
            writer_pid: self.writer_pid,
            capacity: self.capacity(),
            data_available: self.data_available,
            read_offset: self.read_offset,
            write_offset: self.write_offset,
            queued_readers: self.read_queue.len(),
            queued_writers: self.write_queue.len(),
        }
    }
}
