/*!
 * Inbound Endpoint Handle
 * The reader side: connects to another process's outpoint and reads from the pipe
 */

use super::outpoint::abort;
use super::staging::Staging;
use super::types::{translate, EndpointError, EndpointResult};
use crate::core::types::{Pid, Size, Tid};
use crate::ipc::requests::{CreateChannelRequest, ReadRequest};
use crate::ipc::types::{ChannelId, PipeClass, PipeSubclass};
use crate::process::{Process, Scheduler};
use crate::syscalls::{Kernel, SyscallNumber};
use log::debug;
use std::sync::Arc;

pub struct BasicInpoint {
    kernel: Arc<Kernel>,
    pid: Pid,
    tid: Tid,
    writer_pid: Pid,
    channel_id: ChannelId,
}

impl BasicInpoint {
    /// Connect to the `class`/`subclass` outpoint of `target`
    ///
    /// A `buffer_size` of 0 selects the kernel default.
    pub fn connect(
        kernel: Arc<Kernel>,
        pid: Pid,
        tid: Tid,
        target: Pid,
        class: PipeClass,
        subclass: PipeSubclass,
        buffer_size: u32,
    ) -> EndpointResult<Self> {
        let process = Self::lookup(&kernel, pid, SyscallNumber::CreatePipe)?;
        let request = Staging::with_struct(
            process.address_space(),
            &CreateChannelRequest {
                class,
                subclass,
                buffer_size,
                channel_id: 0,
            },
        )?;

        let call = SyscallNumber::CreatePipe;
        let ret = kernel.call(
            pid,
            tid,
            call.as_raw(),
            u64::from(target),
            request.ptr().into(),
            0,
        );
        translate(call, ret, true)?;
        let channel_id = request.read::<CreateChannelRequest>()?.channel_id;
        drop(request);
        debug!("PID {} connected to PID {} on pipe {}", pid, target, channel_id);

        Ok(Self {
            kernel,
            pid,
            tid,
            writer_pid: target,
            channel_id,
        })
    }

    /// The same connection, used from another thread of the process
    pub fn for_thread(&self, tid: Tid) -> Self {
        Self {
            kernel: Arc::clone(&self.kernel),
            tid,
            ..*self
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn writer_pid(&self) -> Pid {
        self.writer_pid
    }

    /// Read up to `len` bytes into `buf[offset..]`, returning how many arrived
    ///
    /// A non-blocking read of an empty pipe returns a recoverable `WouldBlock`.
    pub fn read(&self, buf: &mut [u8], offset: Size, len: Size, blocking: bool) -> EndpointResult<Size> {
        let needed = offset + len;
        if buf.len() < needed {
            return Err(EndpointError::BufferTooSmall {
                needed,
                len: buf.len(),
            });
        }

        let process = Self::lookup(&self.kernel, self.pid, SyscallNumber::ReadPipe)?;
        let space = process.address_space();
        let buffer = Staging::bytes(space, needed)?;
        let request = Staging::with_struct(
            space,
            &ReadRequest {
                channel_id: self.channel_id,
                out_buffer: buffer.ptr(),
                offset: offset as u32,
                length: len as u32,
                blocking,
                aborted: false,
            },
        )?;

        let call = SyscallNumber::ReadPipe;
        let ret = self
            .kernel
            .call(self.pid, self.tid, call.as_raw(), request.ptr().into(), 0, 0);
        let read = translate(call, ret, blocking)? as Size;

        let data = space.read_bytes(buffer.ptr().offset(offset), read)?;
        buf[offset..offset + read].copy_from_slice(&data);
        Ok(read)
    }

    /// Abort this process's queued read, issued from thread `tid`
    pub fn abort(&self, tid: Tid) -> EndpointResult<()> {
        abort(&self.kernel, self.pid, tid, self.channel_id)
    }

    fn lookup(kernel: &Kernel, pid: Pid, call: SyscallNumber) -> EndpointResult<Arc<Process>> {
        kernel
            .processes()
            .process(pid)
            .ok_or(EndpointError::Failed { call })
    }
}
