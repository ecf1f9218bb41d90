/*!
 * Kernel Threads
 *
 * A kernel thread record plus the OS thread parking that backs suspension in
 * this hosted kernel: `sleep_indefinitely` takes the thread off the run queue,
 * `wake` puts it back, and the OS thread driving it parks in
 * `block_until_woken` in between.
 */

use super::types::{CallSlots, ParamSlot, ReturnSlot, ThreadState};
use crate::core::types::{Pid, ThreadRef, Tid};
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct Thread {
    tid: Tid,
    pid: Pid,
    name: String,
    state: Mutex<ThreadState>,
    wakeup: Condvar,
    slots: Mutex<CallSlots>,
    suspensions: AtomicU64,
}

impl Thread {
    pub(crate) fn new(pid: Pid, tid: Tid, name: impl Into<String>) -> Self {
        Self {
            tid,
            pid,
            name: name.into(),
            state: Mutex::new(ThreadState::Runnable),
            wakeup: Condvar::new(),
            slots: Mutex::new(CallSlots::default()),
            suspensions: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn tid(&self) -> Tid {
        self.tid
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn id(&self) -> ThreadRef {
        ThreadRef::new(self.pid, self.tid)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ThreadState {
        *self.state.lock()
    }

    /// Number of times this thread has been taken off the run queue
    pub fn times_suspended(&self) -> u64 {
        self.suspensions.load(Ordering::Relaxed)
    }

    /// Take the thread off the run queue until someone calls [`wake`](Self::wake)
    pub fn sleep_indefinitely(&self) {
        let mut state = self.state.lock();
        *state = ThreadState::Sleeping;
        self.suspensions.fetch_add(1, Ordering::Relaxed);
        debug!("Thread {} suspended", self.id());
    }

    /// Make the thread runnable again; no-op if it is not asleep
    pub fn wake(&self) {
        let mut state = self.state.lock();
        if *state == ThreadState::Sleeping {
            *state = ThreadState::Runnable;
            self.wakeup.notify_all();
            debug!("Thread {} woken", self.id());
        }
    }

    /// Park the calling OS thread while this kernel thread is asleep
    pub fn block_until_woken(&self) {
        let mut state = self.state.lock();
        while *state == ThreadState::Sleeping {
            self.wakeup.wait(&mut state);
        }
    }

    /// Like [`block_until_woken`](Self::block_until_woken) with an upper bound
    ///
    /// Returns `true` if the thread is runnable on return.
    pub fn block_until_woken_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state == ThreadState::Sleeping {
            if self.wakeup.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state == ThreadState::Runnable
    }

    pub fn slots(&self) -> CallSlots {
        *self.slots.lock()
    }

    /// Load the parameters of a new call and clear the previous call's returns
    pub fn begin_call(&self, params: [u64; 3]) {
        let mut slots = self.slots.lock();
        slots.params = params;
        slots.returns = [0; 4];
    }

    #[inline]
    pub fn param(&self, slot: ParamSlot) -> u64 {
        self.slots.lock().param(slot)
    }

    #[inline]
    pub fn return_value(&self, slot: ReturnSlot) -> u64 {
        self.slots.lock().ret(slot)
    }

    #[inline]
    pub fn set_return(&self, slot: ReturnSlot, value: u64) {
        self.slots.lock().set_ret(slot, value);
    }

    /// Write several return slots at once
    pub fn set_returns(&self, values: &[(ReturnSlot, u64)]) {
        let mut slots = self.slots.lock();
        for &(slot, value) in values {
            slots.set_ret(slot, value);
        }
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("pid", &self.pid)
            .field("tid", &self.tid)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
