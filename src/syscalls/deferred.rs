/*!
 * Deferred Call Completion
 *
 * A dedicated kernel thread that finishes calls the dispatcher chose not to
 * resolve on the caller's stack. Records come from a fixed pool and travel
 * through a FIFO channel; the worker idles blocked on that channel.
 */

use super::types::{CallResult, DeferredError};
use crate::core::limits::DEFERRED_WORKER_NAME;
use crate::core::types::{Pid, Tid};
use crate::process::{ReturnSlot, Scheduler};
use crossbeam_queue::ArrayQueue;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A pending call: who made it and which call it was
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeferredCall {
    pub pid: Pid,
    pub tid: Tid,
    /// Raw call number
    pub number: u32,
}

/// What the handler did with a deferred call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The worker writes `Return1` and wakes the caller
    Finish(CallResult),
    /// Waking the caller belongs to someone else (a drain or a connect)
    Parked,
}

/// Deferred-side half of a kernel call
pub trait DeferredHandler: Send + Sync {
    fn handle_deferred(&self, call: &DeferredCall) -> Resolution;
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    parked: AtomicU64,
}

/// Worker counters snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeferredStats {
    pub submitted: u64,
    pub completed: u64,
    pub parked: u64,
    pub free_records: usize,
}

pub struct DeferredWorker {
    sender: Option<flume::Sender<DeferredCall>>,
    pool: Arc<ArrayQueue<DeferredCall>>,
    counters: Arc<Counters>,
    handle: Option<JoinHandle<()>>,
}

impl DeferredWorker {
    pub fn spawn(
        handler: Arc<dyn DeferredHandler>,
        scheduler: Arc<dyn Scheduler>,
        pool_size: usize,
    ) -> Result<Self, DeferredError> {
        let pool = Arc::new(ArrayQueue::new(pool_size.max(1)));
        while pool.push(DeferredCall::default()).is_ok() {}

        let (sender, receiver) = flume::unbounded::<DeferredCall>();
        let counters = Arc::new(Counters::default());

        let worker_pool = Arc::clone(&pool);
        let worker_counters = Arc::clone(&counters);
        let handle = std::thread::Builder::new()
            .name(DEFERRED_WORKER_NAME.to_string())
            .spawn(move || {
                // Ends once every sender is gone
                while let Ok(call) = receiver.recv() {
                    Self::run(&call, handler.as_ref(), scheduler.as_ref(), &worker_counters);
                    if worker_pool.push(DeferredCall::default()).is_err() {
                        error!("Deferred record pool overflow returning record for {}:{}", call.pid, call.tid);
                    }
                }
                debug!("Deferred call worker exiting");
            })
            .map_err(DeferredError::Spawn)?;

        info!("Deferred call worker started ({} records)", pool.capacity());
        Ok(Self {
            sender: Some(sender),
            pool,
            counters,
            handle: Some(handle),
        })
    }

    fn run(
        call: &DeferredCall,
        handler: &dyn DeferredHandler,
        scheduler: &dyn Scheduler,
        counters: &Counters,
    ) {
        match handler.handle_deferred(call) {
            Resolution::Finish(result) => {
                match scheduler.thread(call.pid, call.tid) {
                    Some(thread) => {
                        thread.set_return(ReturnSlot::R1, result.as_raw());
                        thread.wake();
                    }
                    None => warn!(
                        "Deferred call {:#x} finished for vanished thread {}:{}",
                        call.number, call.pid, call.tid
                    ),
                }
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Resolution::Parked => {
                counters.parked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Hand a call to the worker
    ///
    /// The caller must already be asleep so a fast completion cannot race
    /// ahead of it.
    pub fn submit(&self, pid: Pid, tid: Tid, number: u32) -> Result<(), DeferredError> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(DeferredError::WorkerStopped);
        };
        let Some(mut record) = self.pool.pop() else {
            let err = DeferredError::PoolExhausted {
                capacity: self.pool.capacity(),
            };
            error!("Deferred call {:#x} from {}:{} dropped: {}", number, pid, tid, err);
            return Err(err);
        };

        record.pid = pid;
        record.tid = tid;
        record.number = number;
        if sender.send(record).is_err() {
            let _ = self.pool.push(DeferredCall::default());
            error!("Deferred call worker is gone");
            return Err(DeferredError::WorkerStopped);
        }
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Calls submitted but not yet handled by the worker
    pub fn pending(&self) -> usize {
        self.sender.as_ref().map_or(0, flume::Sender::len)
    }

    pub fn stats(&self) -> DeferredStats {
        DeferredStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            parked: self.counters.parked.load(Ordering::Relaxed),
            free_records: self.pool.len(),
        }
    }

    /// Stop accepting calls and join the worker after it finishes the queue
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Deferred call worker panicked");
            } else {
                info!("Deferred call worker stopped");
            }
        }
    }
}

impl Drop for DeferredWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessTable, ThreadState};
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Recorder {
        seen: Mutex<Vec<DeferredCall>>,
        resolution: Resolution,
    }

    impl DeferredHandler for Recorder {
        fn handle_deferred(&self, call: &DeferredCall) -> Resolution {
            self.seen.lock().push(*call);
            self.resolution
        }
    }

    fn recorder(resolution: Resolution) -> Arc<Recorder> {
        Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            resolution,
        })
    }

    #[test]
    fn test_finish_writes_result_and_wakes() {
        let table = Arc::new(ProcessTable::with_user_memory(16 * 1024));
        let process = table.spawn_process("p");
        let thread = process.spawn_thread("main");
        let handler = recorder(Resolution::Finish(CallResult::Ok));

        let mut worker = DeferredWorker::spawn(handler.clone(), table.clone(), 4).unwrap();
        thread.begin_call([0; 3]);
        thread.sleep_indefinitely();
        worker.submit(process.pid(), thread.tid(), 0x45).unwrap();

        assert!(thread.block_until_woken_for(Duration::from_secs(5)));
        assert_eq!(thread.return_value(ReturnSlot::R1), CallResult::Ok.as_raw());
        worker.shutdown();

        let stats = worker.stats();
        assert_eq!((stats.submitted, stats.completed, stats.parked), (1, 1, 0));
        assert_eq!(stats.free_records, 4);
        assert_eq!(handler.seen.lock()[0].number, 0x45);
    }

    #[test]
    fn test_parked_leaves_thread_asleep() {
        let table = Arc::new(ProcessTable::with_user_memory(16 * 1024));
        let process = table.spawn_process("p");
        let thread = process.spawn_thread("main");

        let mut worker =
            DeferredWorker::spawn(recorder(Resolution::Parked), table.clone(), 2).unwrap();
        thread.sleep_indefinitely();
        worker.submit(process.pid(), thread.tid(), 0x43).unwrap();
        worker.shutdown();

        assert_eq!(thread.state(), ThreadState::Sleeping);
        assert_eq!(worker.stats().parked, 1);
    }

    struct Gate {
        release: flume::Receiver<()>,
    }

    impl DeferredHandler for Gate {
        fn handle_deferred(&self, _call: &DeferredCall) -> Resolution {
            let _ = self.release.recv();
            Resolution::Parked
        }
    }

    #[test]
    fn test_pool_exhaustion() {
        let table = Arc::new(ProcessTable::new());
        let (open, release) = flume::unbounded();
        let mut worker = DeferredWorker::spawn(Arc::new(Gate { release }), table, 1).unwrap();

        worker.submit(1, 1, 0x45).unwrap();
        assert!(matches!(
            worker.submit(1, 2, 0x45),
            Err(DeferredError::PoolExhausted { capacity: 1 })
        ));

        open.send(()).unwrap();
        worker.shutdown();
        assert_eq!(worker.stats().free_records, 1);
    }

    #[test]
    fn test_submit_after_shutdown() {
        let table = Arc::new(ProcessTable::new());
        let mut worker =
            DeferredWorker::spawn(recorder(Resolution::Parked), table, 1).unwrap();
        worker.shutdown();
        assert!(matches!(
            worker.submit(1, 1, 0x45),
            Err(DeferredError::WorkerStopped)
        ));
    }
}
