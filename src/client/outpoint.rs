/*!
 * Outbound Endpoint Handle
 *
 * The writer side as seen from user code: publishes an outpoint, waits for
 * readers to connect and writes into the resulting pipes.
 */

use super::staging::Staging;
use super::types::{translate, EndpointError, EndpointResult};
use crate::core::types::{Pid, Size, Tid};
use crate::ipc::requests::{
    ChannelDescriptor, EndpointDescriptor, ListEndpointsRequest, WaitForConnectRequest,
    WriteRequest,
};
use crate::ipc::types::{ChannelId, PipeClass, PipeSubclass};
use crate::memory::UserStruct;
use crate::process::{Process, Scheduler};
use crate::syscalls::{Kernel, SyscallNumber};
use log::debug;
use std::sync::Arc;

pub struct BasicOutpoint {
    kernel: Arc<Kernel>,
    pid: Pid,
    tid: Tid,
    class: PipeClass,
    subclass: PipeSubclass,
}

impl BasicOutpoint {
    /// Register the outpoint on behalf of thread `tid` of `pid`
    ///
    /// Registering an existing outpoint again is harmless.
    pub fn new(
        kernel: Arc<Kernel>,
        pid: Pid,
        tid: Tid,
        class: PipeClass,
        subclass: PipeSubclass,
        max_connections: i32,
    ) -> EndpointResult<Self> {
        let call = SyscallNumber::RegisterPipeOutpoint;
        let ret = kernel.call(
            pid,
            tid,
            call.as_raw(),
            class.as_raw(),
            subclass.as_raw(),
            i64::from(max_connections) as u64,
        );
        translate(call, ret, true)?;
        debug!("PID {} publishes {:?}/{:?}", pid, class, subclass);

        Ok(Self {
            kernel,
            pid,
            tid,
            class,
            subclass,
        })
    }

    /// The same outpoint, used from another thread of the process
    pub fn for_thread(&self, tid: Tid) -> Self {
        Self {
            kernel: Arc::clone(&self.kernel),
            tid,
            ..*self
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Block until a reader connects, returning the new pipe
    pub fn wait_for_connect(&self) -> EndpointResult<ChannelDescriptor> {
        let process = self.process()?;
        let request = Staging::with_struct(
            process.address_space(),
            &WaitForConnectRequest::new(self.class, self.subclass),
        )?;

        let call = SyscallNumber::WaitOnPipeCreate;
        let ret = self
            .kernel
            .call(self.pid, self.tid, call.as_raw(), request.ptr().into(), 0, 0);
        translate(call, ret, true)?;

        let filled: WaitForConnectRequest = request.read()?;
        Ok(filled.result)
    }

    /// Write `data[offset..offset + len]` into pipe `channel_id`
    ///
    /// Writes are all-or-nothing. A non-blocking write that cannot complete
    /// returns a recoverable `WouldBlock`.
    pub fn write(
        &self,
        channel_id: ChannelId,
        data: &[u8],
        offset: Size,
        len: Size,
        blocking: bool,
    ) -> EndpointResult<Size> {
        let needed = offset + len;
        if data.len() < needed {
            return Err(EndpointError::BufferTooSmall {
                needed,
                len: data.len(),
            });
        }

        let process = self.process()?;
        let space = process.address_space();
        let buffer = Staging::bytes(space, needed)?;
        space.write_bytes(buffer.ptr(), &data[..needed])?;
        let request = Staging::with_struct(
            space,
            &WriteRequest {
                channel_id,
                in_buffer: buffer.ptr(),
                offset: offset as u32,
                length: len as u32,
                blocking,
                aborted: false,
            },
        )?;

        let call = SyscallNumber::WritePipe;
        let ret = self
            .kernel
            .call(self.pid, self.tid, call.as_raw(), request.ptr().into(), 0, 0);
        translate(call, ret, blocking).map(|written| written as Size)
    }

    /// Abort this process's queued write on `channel_id`, issued from thread `tid`
    pub fn abort(&self, tid: Tid, channel_id: ChannelId) -> EndpointResult<()> {
        abort(&self.kernel, self.pid, tid, channel_id)
    }

    /// Number of outpoints of `class`/`subclass` that still accept connections
    pub fn count(
        kernel: &Kernel,
        pid: Pid,
        tid: Tid,
        class: PipeClass,
        subclass: PipeSubclass,
    ) -> EndpointResult<usize> {
        let call = SyscallNumber::GetNumPipeOutpoints;
        let ret = kernel.call(pid, tid, call.as_raw(), class.as_raw(), subclass.as_raw(), 0);
        translate(call, ret, true).map(|count| count as usize)
    }

    /// Owners of up to `max` outpoints of `class`/`subclass` that still accept connections
    pub fn list(
        kernel: &Kernel,
        pid: Pid,
        tid: Tid,
        class: PipeClass,
        subclass: PipeSubclass,
        max: usize,
    ) -> EndpointResult<Vec<Pid>> {
        let process = kernel
            .processes()
            .process(pid)
            .ok_or(EndpointError::Failed {
                call: SyscallNumber::GetPipeOutpoints,
            })?;
        let space = process.address_space();
        let descriptors = Staging::bytes(space, max * EndpointDescriptor::SIZE)?;
        let request = Staging::with_struct(
            space,
            &ListEndpointsRequest {
                max_descriptors: max as u32,
                out_descriptors: descriptors.ptr(),
            },
        )?;

        let call = SyscallNumber::GetPipeOutpoints;
        let ret = kernel.call(
            pid,
            tid,
            call.as_raw(),
            class.as_raw(),
            subclass.as_raw(),
            request.ptr().into(),
        );
        let written = translate(call, ret, true)? as usize;

        let mut owners = Vec::with_capacity(written);
        for index in 0..written {
            let slot = descriptors.ptr().offset(index * EndpointDescriptor::SIZE);
            let descriptor: EndpointDescriptor = space.read_struct(slot)?;
            owners.push(descriptor.process_id);
        }
        Ok(owners)
    }

    fn process(&self) -> EndpointResult<Arc<Process>> {
        self.kernel
            .processes()
            .process(self.pid)
            .ok_or(EndpointError::Failed {
                call: SyscallNumber::RegisterPipeOutpoint,
            })
    }
}

pub(crate) fn abort(kernel: &Kernel, pid: Pid, tid: Tid, channel_id: ChannelId) -> EndpointResult<()> {
    let call = SyscallNumber::AbortPipeReadWrite;
    let ret = kernel.call(pid, tid, call.as_raw(), u64::from(channel_id), 0, 0);
    translate(call, ret, true).map(|_| ())
}
