/*!
 * Call Dispatcher
 *
 * Decodes pipe IPC calls from a thread's parameter slots. Calls that can
 * finish on the caller's stack are resolved here; blocking ones are reported
 * as `Deferred` and later finished through `DeferredHandler`.
 */

use super::deferred::{DeferredCall, DeferredHandler, Resolution};
use super::types::{CallResult, SyscallNumber};
use crate::core::types::{Pid, Size};
use crate::ipc::requests::{ReadRequest, WriteRequest};
use crate::ipc::types::{ChannelId, IpcError, IpcResult, PipeClass, PipeSubclass};
use crate::ipc::{PipeManager, RwResult};
use crate::memory::UserPtr;
use crate::process::{ParamSlot, ReturnSlot, Scheduler, Thread};
use log::{debug, error, warn};
use std::sync::Arc;

pub struct SyscallDispatcher {
    pipes: Arc<PipeManager>,
    scheduler: Arc<dyn Scheduler>,
}

impl SyscallDispatcher {
    pub fn new(pipes: Arc<PipeManager>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { pipes, scheduler }
    }

    /// Resolve what can be resolved immediately
    ///
    /// Values go to `Return2..4` of `thread`; the returned code belongs in
    /// `Return1` unless it is `Deferred`.
    pub fn dispatch(&self, thread: &Thread, number: u32) -> CallResult {
        let Some(call) = SyscallNumber::from_raw(number) else {
            warn!("Unhandled kernel call {:#x} from {}", number, thread.id());
            return CallResult::Unhandled;
        };
        let pid = thread.pid();

        match call {
            SyscallNumber::RegisterPipeOutpoint => {
                let outcome = self.pipe_tags(thread).and_then(|(class, subclass)| {
                    let max_connections = thread.param(ParamSlot::P3) as i32;
                    self.pipes
                        .register_outpoint(pid, class, subclass, max_connections)
                });
                Self::complete(call, outcome.map(|_| ()))
            }
            SyscallNumber::GetNumPipeOutpoints => {
                let outcome = self
                    .pipe_tags(thread)
                    .map(|(class, subclass)| self.pipes.count_outpoints(class, subclass));
                Self::complete_with_value(call, thread, outcome)
            }
            SyscallNumber::GetPipeOutpoints => {
                let outcome = self.pipe_tags(thread).and_then(|(class, subclass)| {
                    let request_ptr = UserPtr::from(thread.param(ParamSlot::P3));
                    self.pipes.list_outpoints(pid, class, subclass, request_ptr)
                });
                Self::complete_with_value(call, thread, outcome)
            }
            SyscallNumber::WaitOnPipeCreate => CallResult::Deferred,
            SyscallNumber::CreatePipe => {
                let writer_pid = thread.param(ParamSlot::P1) as Pid;
                let request_ptr = UserPtr::from(thread.param(ParamSlot::P2));
                let outcome = self
                    .pipes
                    .create_channel(pid, writer_pid, request_ptr)
                    .map(|id| id as Size);
                Self::complete_with_value(call, thread, outcome)
            }
            SyscallNumber::ReadPipe | SyscallNumber::WritePipe => {
                match self.is_blocking(thread, call) {
                    Ok(true) => CallResult::Deferred,
                    Ok(false) => {
                        let outcome = self.run_pipe_op(thread, call);
                        match outcome {
                            // The drain leaves the final code in Return1
                            Ok(RwResult::Complete) => {
                                CallResult::from_raw(thread.return_value(ReturnSlot::R1))
                            }
                            Ok(RwResult::Error) => CallResult::Fail,
                            Ok(RwResult::Queued) => {
                                error!(
                                    "Non-blocking {} by {} was left queued",
                                    call,
                                    thread.id()
                                );
                                CallResult::Unhandled
                            }
                            Err(e) => Self::failure(call, &e),
                        }
                    }
                    Err(e) => Self::failure(call, &e),
                }
            }
            SyscallNumber::AbortPipeReadWrite => {
                let channel_id = thread.param(ParamSlot::P1) as ChannelId;
                match self.pipes.abort(pid, channel_id) {
                    Ok(true) => CallResult::Ok,
                    Ok(false) => {
                        debug!("Abort on pipe {} by PID {} left a request queued", channel_id, pid);
                        CallResult::Fail
                    }
                    Err(e) => Self::failure(call, &e),
                }
            }
        }
    }

    fn pipe_tags(&self, thread: &Thread) -> IpcResult<(PipeClass, PipeSubclass)> {
        let raw_class = thread.param(ParamSlot::P1);
        let raw_subclass = thread.param(ParamSlot::P2);
        let class = PipeClass::from_raw(raw_class)
            .ok_or_else(|| IpcError::InvalidParameter(format!("pipe class {}", raw_class)))?;
        let subclass = PipeSubclass::from_raw(raw_subclass).ok_or_else(|| {
            IpcError::InvalidParameter(format!("pipe subclass {}", raw_subclass))
        })?;
        Ok((class, subclass))
    }

    /// Read the caller's own request to see whether it may suspend
    fn is_blocking(&self, thread: &Thread, call: SyscallNumber) -> IpcResult<bool> {
        let process = self
            .scheduler
            .process(thread.pid())
            .ok_or(IpcError::ProcessNotFound(thread.pid()))?;
        let request_ptr = UserPtr::from(thread.param(ParamSlot::P1));
        let space = process.address_space();
        let blocking = match call {
            SyscallNumber::ReadPipe => space.read_struct::<ReadRequest>(request_ptr)?.blocking,
            _ => space.read_struct::<WriteRequest>(request_ptr)?.blocking,
        };
        Ok(blocking)
    }

    fn run_pipe_op(&self, thread: &Thread, call: SyscallNumber) -> IpcResult<RwResult> {
        match call {
            SyscallNumber::ReadPipe => self.pipes.read(thread.pid(), thread.tid()),
            _ => self.pipes.write(thread.pid(), thread.tid()),
        }
    }

    fn complete(call: SyscallNumber, outcome: IpcResult<()>) -> CallResult {
        match outcome {
            Ok(()) => CallResult::Ok,
            Err(e) => Self::failure(call, &e),
        }
    }

    fn complete_with_value(call: SyscallNumber, thread: &Thread, outcome: IpcResult<Size>) -> CallResult {
        match outcome {
            Ok(value) => {
                thread.set_return(ReturnSlot::R2, value as u64);
                CallResult::Ok
            }
            Err(e) => Self::failure(call, &e),
        }
    }

    /// Validation failures become `Fail`; broken invariants become `Unhandled`
    fn failure(call: SyscallNumber, err: &IpcError) -> CallResult {
        if err.is_integrity_fault() {
            error!("{} halted by integrity fault: {}", call, err);
            CallResult::Unhandled
        } else {
            debug!("{} failed: {}", call, err);
            CallResult::Fail
        }
    }
}

impl DeferredHandler for SyscallDispatcher {
    fn handle_deferred(&self, call: &DeferredCall) -> Resolution {
        let Some(number) = SyscallNumber::from_raw(call.number) else {
            error!("Deferred record carries unknown call {:#x}", call.number);
            return Resolution::Finish(CallResult::Unhandled);
        };

        let outcome = match number {
            SyscallNumber::WaitOnPipeCreate => {
                self.pipes.register_wait(call.pid, call.tid).map(|_| ())
            }
            SyscallNumber::ReadPipe => self.pipes.read(call.pid, call.tid).map(|_| ()),
            SyscallNumber::WritePipe => self.pipes.write(call.pid, call.tid).map(|_| ()),
            other => {
                error!("{} cannot be deferred", other);
                return Resolution::Finish(CallResult::Unhandled);
            }
        };

        match outcome {
            // Completed, unwound or queued: the pipe manager owns the wake-up
            Ok(()) => Resolution::Parked,
            Err(e) => Resolution::Finish(Self::failure(number, &e)),
        }
    }
}
