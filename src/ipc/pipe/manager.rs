/*!
 * Pipe Manager
 * Central manager for outpoints, pipes and the queue-drain algorithm
 */

use super::super::outpoint::{OutpointRegistry, OutpointStats};
use super::super::requests::{
    ChannelDescriptor, CreateChannelRequest, EndpointDescriptor, ListEndpointsRequest,
    ReadRequest, WaitForConnectRequest, WriteRequest,
};
use super::super::types::{
    ChannelId, IpcError, IpcResult, OutpointId, PipeClass, PipeSubclass,
};
use super::pipe::Pipe;
use super::types::{ChannelStats, QueuedOp, RwResult};
use crate::core::config::KernelConfig;
use crate::core::limits::FIRST_CHANNEL_ID;
use crate::core::types::{Pid, Size, Tid};
use crate::memory::{CrossContextAccess, UserPtr, UserStruct};
use crate::process::{ParamSlot, Process, ReturnSlot, Scheduler, Thread};
use crate::syscalls::types::CallResult;
use ahash::AHashMap;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Which queue of a pipe an operation lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// Everything guarded by the manager lock
#[derive(Debug)]
struct PipeTable {
    registry: OutpointRegistry,
    pipes: AHashMap<ChannelId, Pipe>,
    next_id: ChannelId,
}

/// Pipe manager
///
/// Every entry point takes the manager lock for its whole duration, so a
/// drain pass is atomic with respect to every other pipe operation.
/// Lock order is manager lock, then a process arena or thread slots.
pub struct PipeManager {
    state: Mutex<PipeTable>,
    scheduler: Arc<dyn Scheduler>,
    access: CrossContextAccess,
    config: KernelConfig,
}

impl PipeManager {
    pub fn new(scheduler: Arc<dyn Scheduler>, config: KernelConfig) -> Self {
        info!(
            "Pipe manager initialized (default buffer: {} bytes, max: {} bytes)",
            config.default_buffer_size, config.max_buffer_size
        );
        Self {
            state: Mutex::new(PipeTable {
                registry: OutpointRegistry::new(),
                pipes: AHashMap::new(),
                next_id: FIRST_CHANNEL_ID,
            }),
            scheduler,
            access: CrossContextAccess::new(),
            config,
        }
    }

    pub fn access(&self) -> &CrossContextAccess {
        &self.access
    }

    // Outpoints

    pub fn register_outpoint(
        &self,
        owner: Pid,
        class: PipeClass,
        subclass: PipeSubclass,
        max_connections: i32,
    ) -> IpcResult<OutpointId> {
        self.state
            .lock()
            .registry
            .register(self.scheduler.as_ref(), owner, class, subclass, max_connections)
    }

    pub fn count_outpoints(&self, class: PipeClass, subclass: PipeSubclass) -> usize {
        self.state.lock().registry.count_available(class, subclass)
    }

    /// Fill the caller's descriptor array from the `ListEndpointsRequest` at `request_ptr`
    ///
    /// Returns how many descriptors were written.
    pub fn list_outpoints(
        &self,
        caller: Pid,
        class: PipeClass,
        subclass: PipeSubclass,
        request_ptr: UserPtr,
    ) -> IpcResult<usize> {
        let process = self.process(caller)?;
        let state = self.state.lock();

        let written = self.access.with(process.address_space(), |guard| {
            let request: ListEndpointsRequest = guard.read_struct(request_ptr)?;
            let owners =
                state
                    .registry
                    .list_available(class, subclass, request.max_descriptors as usize);
            for (index, owner) in owners.iter().enumerate() {
                let slot = request
                    .out_descriptors
                    .offset(index * EndpointDescriptor::SIZE);
                guard.write_struct(slot, &EndpointDescriptor { process_id: *owner })?;
            }
            Ok(owners.len())
        })?;

        debug!(
            "Listed {} outpoint(s) of {:?}/{:?} for PID {}",
            written, class, subclass, caller
        );
        Ok(written)
    }

    /// Queue `tid` for the next connection to its own outpoint
    ///
    /// The outpoint is named by the `WaitForConnectRequest` at the thread's
    /// `Param1`. The thread is not suspended here.
    pub fn register_wait(&self, owner: Pid, tid: Tid) -> IpcResult<OutpointId> {
        let (process, thread) = self.thread(owner, tid)?;
        let request_ptr = UserPtr::from(thread.param(ParamSlot::P1));

        let mut state = self.state.lock();
        let request: WaitForConnectRequest = self
            .access
            .with(process.address_space(), |guard| guard.read_struct(request_ptr))?;
        state.registry.register_wait(
            self.scheduler.as_ref(),
            owner,
            tid,
            request.class,
            request.subclass,
        )
    }

    pub fn outpoint_stats(
        &self,
        owner: Pid,
        class: PipeClass,
        subclass: PipeSubclass,
    ) -> Option<OutpointStats> {
        let state = self.state.lock();
        let id = state.registry.find(owner, class, subclass)?;
        state.registry.get(id).map(|outpoint| outpoint.stats())
    }

    /// Threads currently waiting for a connection to the outpoint
    pub fn waiting_count(&self, owner: Pid, class: PipeClass, subclass: PipeSubclass) -> usize {
        self.outpoint_stats(owner, class, subclass)
            .map_or(0, |stats| stats.waiting)
    }

    // Pipes

    /// Connect `reader_pid` to the outpoint of `writer_pid`
    ///
    /// The `CreateChannelRequest` at `request_ptr` (reader memory) names the
    /// class, subclass and buffer size, and receives the new channel id.
    pub fn create_channel(
        &self,
        reader_pid: Pid,
        writer_pid: Pid,
        request_ptr: UserPtr,
    ) -> IpcResult<ChannelId> {
        let reader = self.process(reader_pid)?;
        self.process(writer_pid)?;

        let mut state = self.state.lock();
        let mut request: CreateChannelRequest = self
            .access
            .with(reader.address_space(), |guard| guard.read_struct(request_ptr))?;

        let outpoint_id = state
            .registry
            .find(writer_pid, request.class, request.subclass)
            .ok_or(IpcError::OutpointNotFound {
                pid: writer_pid,
                class: request.class,
                subclass: request.subclass,
            })?;
        let outpoint = state
            .registry
            .get(outpoint_id)
            .ok_or_else(|| IpcError::Integrity(format!("outpoint {:?} vanished", outpoint_id)))?;
        if !outpoint.has_capacity() {
            return Err(IpcError::OutpointFull {
                pid: writer_pid,
                max: outpoint.max_connections,
            });
        }

        let capacity = self.buffer_size(request.buffer_size)?;
        let id = state.next_id;
        let next_id = id.checked_add(1).ok_or(IpcError::ChannelIdsExhausted)?;
        request.channel_id = id;
        self.access
            .with(reader.address_space(), |guard| guard.write_struct(request_ptr, &request))?;

        state.next_id = next_id;
        state.pipes.insert(
            id,
            Pipe::new(
                id,
                outpoint_id,
                request.class,
                request.subclass,
                reader_pid,
                writer_pid,
                capacity,
            ),
        );
        if let Some(outpoint) = state.registry.get_mut(outpoint_id) {
            outpoint.connections += 1;
        }

        info!(
            "Created pipe {}: PID {} reads from PID {} ({:?}/{:?}, capacity: {})",
            id, reader_pid, writer_pid, request.class, request.subclass, capacity
        );

        let descriptor = ChannelDescriptor {
            channel_id: id,
            buffer_size: capacity as u32,
            class: request.class,
            subclass: request.subclass,
            reader_pid,
            writer_pid,
        };
        state
            .registry
            .wake_waiters(outpoint_id, &descriptor, self.scheduler.as_ref(), &self.access);
        Ok(id)
    }

    /// Submit the `ReadRequest` at the caller thread's `Param1`
    ///
    /// `Complete` and `Error` leave the thread's return slots filled and the
    /// thread woken. `Queued` leaves it waiting for a future drain.
    pub fn read(&self, pid: Pid, tid: Tid) -> IpcResult<RwResult> {
        let (process, thread) = self.thread(pid, tid)?;
        let request_ptr = UserPtr::from(thread.param(ParamSlot::P1));

        let mut state = self.state.lock();
        let request: ReadRequest = self
            .access
            .with(process.address_space(), |guard| {
                let request: ReadRequest = guard.read_struct(request_ptr)?;
                guard.slice(
                    request.out_buffer,
                    request.offset as Size + request.length as Size,
                )?;
                Ok(request)
            })?;

        let pipe = Self::pipe_mut(&mut state.pipes, request.channel_id)?;
        if pipe.reader_pid != pid {
            return Err(IpcError::PermissionDenied(format!(
                "PID {} is not the reader of pipe {}",
                pid, request.channel_id
            )));
        }

        thread.set_return(ReturnSlot::R1, CallResult::Fail.as_raw());
        pipe.enqueue_read(tid);
        self.drain(pipe)?;

        self.settle(pipe, &thread, Direction::Read, request.blocking)
    }

    /// Submit the `WriteRequest` at the caller thread's `Param1`
    ///
    /// Writes are all-or-nothing; a write that can never fit the pipe is
    /// rejected instead of queued.
    pub fn write(&self, pid: Pid, tid: Tid) -> IpcResult<RwResult> {
        let (process, thread) = self.thread(pid, tid)?;
        let request_ptr = UserPtr::from(thread.param(ParamSlot::P1));

        let mut state = self.state.lock();
        let request: WriteRequest = self
            .access
            .with(process.address_space(), |guard| {
                let request: WriteRequest = guard.read_struct(request_ptr)?;
                guard.slice(
                    request.in_buffer,
                    request.offset as Size + request.length as Size,
                )?;
                Ok(request)
            })?;

        let pipe = Self::pipe_mut(&mut state.pipes, request.channel_id)?;
        if pipe.writer_pid != pid {
            return Err(IpcError::PermissionDenied(format!(
                "PID {} is not the writer of pipe {}",
                pid, request.channel_id
            )));
        }
        let len = request.length as Size;
        if !pipe.fits(len) {
            return Err(IpcError::CapacityExceeded {
                requested: len,
                capacity: pipe.capacity(),
            });
        }

        thread.set_return(ReturnSlot::R1, CallResult::Fail.as_raw());
        pipe.enqueue_write(tid, len);
        self.drain(pipe)?;

        self.settle(pipe, &thread, Direction::Write, request.blocking)
    }

    /// Abort the caller's pending operation at the head of each queue it owns
    ///
    /// Returns whether the aborted request has left its queue. Nothing queued
    /// is a successful no-op.
    pub fn abort(&self, pid: Pid, channel_id: ChannelId) -> IpcResult<bool> {
        let mut state = self.state.lock();
        let pipe = Self::pipe_mut(&mut state.pipes, channel_id)?;

        let mut directions = Vec::with_capacity(2);
        if pipe.reader_pid == pid {
            directions.push(Direction::Read);
        }
        if pipe.writer_pid == pid {
            directions.push(Direction::Write);
        }
        if directions.is_empty() {
            return Err(IpcError::PermissionDenied(format!(
                "PID {} owns neither side of pipe {}",
                pid, channel_id
            )));
        }

        let mut flagged = Vec::new();
        for direction in directions {
            let head = match direction {
                Direction::Read => pipe.peek_read(),
                Direction::Write => pipe.peek_write(),
            };
            if let Some(op) = head {
                self.flag_aborted(pipe, direction, op)?;
                flagged.push((direction, op.thread));
            }
        }

        if flagged.is_empty() {
            debug!("Abort on pipe {} by PID {}: nothing queued", channel_id, pid);
            return Ok(true);
        }

        self.drain(pipe)?;

        let cleared = flagged.iter().all(|(direction, thread)| match direction {
            Direction::Read => !pipe.is_read_queued(*thread),
            Direction::Write => !pipe.is_write_queued(*thread),
        });
        info!(
            "Aborted {} request(s) on pipe {} for PID {}",
            flagged.len(),
            channel_id,
            pid
        );
        Ok(cleared)
    }

    pub fn stats(&self, channel_id: ChannelId) -> Option<ChannelStats> {
        self.state.lock().pipes.get(&channel_id).map(Pipe::stats)
    }

    pub fn channel_count(&self) -> usize {
        self.state.lock().pipes.len()
    }

    // Internals

    fn buffer_size(&self, requested: u32) -> IpcResult<Size> {
        let requested = requested as Size;
        if requested == 0 {
            return Ok(self.config.default_buffer_size);
        }
        if requested > self.config.max_buffer_size {
            return Err(IpcError::InvalidBufferSize {
                requested,
                max: self.config.max_buffer_size,
            });
        }
        Ok(requested)
    }

    fn process(&self, pid: Pid) -> IpcResult<Arc<Process>> {
        self.scheduler
            .process(pid)
            .ok_or(IpcError::ProcessNotFound(pid))
    }

    fn thread(&self, pid: Pid, tid: Tid) -> IpcResult<(Arc<Process>, Arc<Thread>)> {
        let process = self.process(pid)?;
        let thread = process
            .thread(tid)
            .ok_or(IpcError::ThreadNotFound { pid, tid })?;
        Ok((process, thread))
    }

    fn pipe_mut(pipes: &mut AHashMap<ChannelId, Pipe>, id: ChannelId) -> IpcResult<&mut Pipe> {
        pipes.get_mut(&id).ok_or(IpcError::ChannelNotFound(id))
    }

    /// Turn the post-drain queue state into the caller's outcome
    fn settle(
        &self,
        pipe: &mut Pipe,
        thread: &Thread,
        direction: Direction,
        blocking: bool,
    ) -> IpcResult<RwResult> {
        let tid = thread.tid();
        let still_queued = match direction {
            Direction::Read => pipe.is_read_queued(tid),
            Direction::Write => pipe.is_write_queued(tid),
        };
        if !still_queued {
            // The drain may have dequeued the request to fail it
            if thread.return_value(ReturnSlot::R1) == CallResult::Ok.as_raw() {
                return Ok(RwResult::Complete);
            }
            return Ok(RwResult::Error);
        }
        if blocking {
            debug!(
                "{:?} by {} queued on pipe {} ({} readers, {} writers)",
                direction,
                thread.id(),
                pipe.id,
                pipe.queued_readers(),
                pipe.queued_writers()
            );
            return Ok(RwResult::Queued);
        }

        let removed = match direction {
            Direction::Read => pipe.remove_last_read(),
            Direction::Write => pipe.remove_last_write(),
        };
        if removed.map(|op| op.thread) != Some(tid) {
            return Err(Self::integrity(format!(
                "unwinding {:?} on pipe {} expected thread {} but found {:?}",
                direction, pipe.id, tid, removed
            )));
        }
        thread.set_return(ReturnSlot::R1, CallResult::Fail.as_raw());
        thread.wake();
        Ok(RwResult::Error)
    }

    fn flag_aborted(&self, pipe: &Pipe, direction: Direction, op: QueuedOp) -> IpcResult<()> {
        let pid = match direction {
            Direction::Read => pipe.reader_pid,
            Direction::Write => pipe.writer_pid,
        };
        let (process, thread) = self.thread(pid, op.thread)?;
        let request_ptr = UserPtr::from(thread.param(ParamSlot::P1));
        self.access.with(process.address_space(), |guard| match direction {
            Direction::Read => {
                let mut request: ReadRequest = guard.read_struct(request_ptr)?;
                request.aborted = true;
                guard.write_struct(request_ptr, &request)
            }
            Direction::Write => {
                let mut request: WriteRequest = guard.read_struct(request_ptr)?;
                request.aborted = true;
                guard.write_struct(request_ptr, &request)
            }
        })?;
        Ok(())
    }

    /// Satisfy as many queued operations as the buffer allows
    ///
    /// Each pass tries the head writer first and only tries the head reader
    /// when no write completed in that pass. Aborted heads are failed
    /// regardless of buffer state.
    fn drain(&self, pipe: &mut Pipe) -> IpcResult<()> {
        loop {
            let mut progressed = false;
            let mut write_done = false;

            if let Some(head) = pipe.peek_write() {
                match self.step_write(pipe, head)? {
                    Step::Transferred => {
                        progressed = true;
                        write_done = true;
                    }
                    Step::Failed => progressed = true,
                    Step::Blocked => {}
                }
            }

            if !write_done {
                if let Some(head) = pipe.peek_read() {
                    if self.step_read(pipe, head)? != Step::Blocked {
                        progressed = true;
                    }
                }
            }

            if !progressed {
                return Ok(());
            }
        }
    }

    fn step_write(&self, pipe: &mut Pipe, head: QueuedOp) -> IpcResult<Step> {
        let Some((process, thread)) = self.queued_thread(pipe.writer_pid, head.thread) else {
            Self::dequeue_checked(pipe, Direction::Write, head)?;
            return Ok(Step::Failed);
        };
        let request_ptr = UserPtr::from(thread.param(ParamSlot::P1));
        let len = head.requested_len.unwrap_or_default();

        let outcome = self.access.with(process.address_space(), |guard| {
            let request: WriteRequest = guard.read_struct(request_ptr)?;
            if request.aborted || !pipe.can_write(len) {
                return Ok((request.aborted, None));
            }
            let offset = request.offset as Size;
            let source = guard.slice(request.in_buffer, offset + len)?;
            Ok((false, Some(pipe.write(source, offset, len))))
        });

        match outcome {
            Ok((false, None)) => Ok(Step::Blocked),
            Ok((_, Some(Ok(())))) => {
                Self::dequeue_checked(pipe, Direction::Write, head)?;
                thread.set_returns(&[
                    (ReturnSlot::R1, CallResult::Ok.as_raw()),
                    (ReturnSlot::R2, len as u64),
                ]);
                thread.wake();
                debug!("Pipe {}: wrote {} bytes for {}", pipe.id, len, thread.id());
                Ok(Step::Transferred)
            }
            Ok((true, None)) => {
                Self::dequeue_checked(pipe, Direction::Write, head)?;
                Self::fail(&thread);
                debug!("Pipe {}: write by {} aborted", pipe.id, thread.id());
                Ok(Step::Failed)
            }
            Ok((_, Some(Err(e)))) => {
                Self::dequeue_checked(pipe, Direction::Write, head)?;
                Self::fail(&thread);
                warn!("Pipe {}: write by {} failed: {}", pipe.id, thread.id(), e);
                Ok(Step::Failed)
            }
            Err(e) => {
                Self::dequeue_checked(pipe, Direction::Write, head)?;
                Self::fail(&thread);
                warn!("Pipe {}: write request of {} unreadable: {}", pipe.id, thread.id(), e);
                Ok(Step::Failed)
            }
        }
    }

    fn step_read(&self, pipe: &mut Pipe, head: QueuedOp) -> IpcResult<Step> {
        let Some((process, thread)) = self.queued_thread(pipe.reader_pid, head.thread) else {
            Self::dequeue_checked(pipe, Direction::Read, head)?;
            return Ok(Step::Failed);
        };
        let request_ptr = UserPtr::from(thread.param(ParamSlot::P1));

        let outcome = self.access.with(process.address_space(), |guard| {
            let request: ReadRequest = guard.read_struct(request_ptr)?;
            if request.aborted || !pipe.can_read() {
                return Ok((request.aborted, None));
            }
            let offset = request.offset as Size;
            let len = pipe.data_available().min(request.length as Size);
            let target = guard.slice_mut(request.out_buffer, offset + len)?;
            Ok((false, Some(pipe.read(target, offset, len))))
        });

        match outcome {
            Ok((false, None)) => Ok(Step::Blocked),
            Ok((_, Some(Ok(read)))) => {
                Self::dequeue_checked(pipe, Direction::Read, head)?;
                thread.set_returns(&[
                    (ReturnSlot::R1, CallResult::Ok.as_raw()),
                    (ReturnSlot::R2, read as u64),
                ]);
                thread.wake();
                debug!("Pipe {}: read {} bytes for {}", pipe.id, read, thread.id());
                Ok(Step::Transferred)
            }
            Ok((true, None)) => {
                Self::dequeue_checked(pipe, Direction::Read, head)?;
                Self::fail(&thread);
                debug!("Pipe {}: read by {} aborted", pipe.id, thread.id());
                Ok(Step::Failed)
            }
            Ok((_, Some(Err(e)))) => {
                Self::dequeue_checked(pipe, Direction::Read, head)?;
                Self::fail(&thread);
                warn!("Pipe {}: read by {} failed: {}", pipe.id, thread.id(), e);
                Ok(Step::Failed)
            }
            Err(e) => {
                Self::dequeue_checked(pipe, Direction::Read, head)?;
                Self::fail(&thread);
                warn!("Pipe {}: read request of {} unreadable: {}", pipe.id, thread.id(), e);
                Ok(Step::Failed)
            }
        }
    }

    fn queued_thread(&self, pid: Pid, tid: Tid) -> Option<(Arc<Process>, Arc<Thread>)> {
        let found = self.thread(pid, tid).ok();
        if found.is_none() {
            warn!("Queued thread {}:{} no longer exists, dropping its request", pid, tid);
        }
        found
    }

    fn dequeue_checked(pipe: &mut Pipe, direction: Direction, head: QueuedOp) -> IpcResult<()> {
        let dequeued = match direction {
            Direction::Read => pipe.dequeue_read(),
            Direction::Write => pipe.dequeue_write(),
        };
        if dequeued != Some(head) {
            return Err(Self::integrity(format!(
                "pipe {} {:?} queue head was {:?} but dequeued {:?}",
                pipe.id, direction, head, dequeued
            )));
        }
        Ok(())
    }

    fn fail(thread: &Thread) {
        thread.set_return(ReturnSlot::R1, CallResult::Fail.as_raw());
        thread.wake();
    }

    fn integrity(message: String) -> IpcError {
        error!("Pipe integrity fault: {}", message);
        IpcError::Integrity(message)
    }
}

/// Result of trying one queue head during a drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Transferred,
    Failed,
    Blocked,
}
