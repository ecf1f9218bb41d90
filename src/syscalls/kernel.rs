/*!
 * Kernel
 *
 * Ties the process table, the pipe manager, the dispatcher and the deferred
 * call worker together behind a single `call` entry point.
 */

use super::deferred::{DeferredStats, DeferredWorker};
use super::dispatcher::SyscallDispatcher;
use super::types::{BootError, CallResult, CallReturn, SyscallNumber};
use crate::core::config::KernelConfig;
use crate::core::types::{Pid, Tid};
use crate::ipc::PipeManager;
use crate::monitoring::CallSpan;
use crate::process::{ProcessTable, ReturnSlot, Scheduler};
use log::{error, info, warn};
use std::sync::Arc;

pub struct Kernel {
    config: KernelConfig,
    processes: Arc<ProcessTable>,
    pipes: Arc<PipeManager>,
    dispatcher: Arc<SyscallDispatcher>,
    worker: DeferredWorker,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Result<Self, BootError> {
        if !config.is_consistent() {
            return Err(BootError::InvalidConfig(format!("{:?}", config)));
        }

        let processes = Arc::new(ProcessTable::with_user_memory(config.user_memory_size));
        let scheduler: Arc<dyn Scheduler> = processes.clone();
        let pipes = Arc::new(PipeManager::new(Arc::clone(&scheduler), config.clone()));
        let dispatcher = Arc::new(SyscallDispatcher::new(
            Arc::clone(&pipes),
            Arc::clone(&scheduler),
        ));
        let worker = DeferredWorker::spawn(
            dispatcher.clone(),
            scheduler,
            config.deferred_pool_size,
        )?;

        info!("Kernel booted");
        Ok(Self {
            config,
            processes,
            pipes,
            dispatcher,
            worker,
        })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn processes(&self) -> &Arc<ProcessTable> {
        &self.processes
    }

    pub fn pipes(&self) -> &PipeManager {
        &self.pipes
    }

    /// Issue a kernel call as thread `tid` of process `pid`
    ///
    /// Must be called from the OS thread driving that kernel thread: a
    /// deferred call parks it until the call resolves.
    pub fn call(&self, pid: Pid, tid: Tid, number: u32, p1: u64, p2: u64, p3: u64) -> CallReturn {
        let span = CallSpan::for_number(SyscallNumber::from_raw(number), pid, tid);
        let _entered = span.enter();

        let Some(thread) = self.processes.thread(pid, tid) else {
            warn!("Kernel call {:#x} from unknown thread {}:{}", number, pid, tid);
            span.record_result(CallResult::Fail);
            return CallReturn::new(CallResult::Fail, [0; 3]);
        };

        thread.begin_call([p1, p2, p3]);
        match self.dispatcher.dispatch(&thread, number) {
            CallResult::Deferred => {
                span.record_deferred();
                thread.sleep_indefinitely();
                if let Err(e) = self.worker.submit(pid, tid, number) {
                    error!("Could not defer call {:#x} from {}: {}", number, thread.id(), e);
                    thread.set_return(ReturnSlot::R1, CallResult::Fail.as_raw());
                    thread.wake();
                }
                thread.block_until_woken();
            }
            result => thread.set_return(ReturnSlot::R1, result.as_raw()),
        }

        let slots = thread.slots();
        let result = CallResult::from_raw(slots.ret(ReturnSlot::R1));
        span.record_result(result);
        CallReturn::new(
            result,
            [
                slots.ret(ReturnSlot::R2),
                slots.ret(ReturnSlot::R3),
                slots.ret(ReturnSlot::R4),
            ],
        )
    }

    /// Deferred calls not yet picked up by the worker
    pub fn pending_deferred(&self) -> usize {
        self.worker.pending()
    }

    pub fn deferred_stats(&self) -> DeferredStats {
        self.worker.stats()
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.worker.shutdown();
        info!("Kernel shut down");
    }
}
