/*!
 * Scheduler Traits
 * The narrow interface the IPC core uses to reach processes and threads
 */

use super::table::Process;
use super::thread::Thread;
use crate::core::types::{Pid, Tid};
use std::sync::Arc;

/// Process/thread lookup
///
/// Suspension and wake-up go through the returned [`Thread`] handles.
pub trait Scheduler: Send + Sync {
    /// Get a process by id
    fn process(&self, pid: Pid) -> Option<Arc<Process>>;

    /// Get a thread by id within a process
    fn thread(&self, pid: Pid, tid: Tid) -> Option<Arc<Thread>> {
        self.process(pid)?.thread(tid)
    }
}
