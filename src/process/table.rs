/*!
 * Process Table
 *
 * Owns every simulated process, its address space and its threads.
 * Implements the `Scheduler` lookups consumed by the IPC core.
 */

use super::thread::Thread;
use super::traits::Scheduler;
use crate::core::limits::DEFAULT_USER_MEMORY_SIZE;
use crate::core::types::{Pid, Size, Tid};
use crate::memory::AddressSpace;
use ahash::{AHashMap, RandomState};
use dashmap::DashMap;
use log::info;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A process: one address space plus its threads
pub struct Process {
    pid: Pid,
    name: String,
    memory: AddressSpace,
    threads: RwLock<AHashMap<Tid, Arc<Thread>>>,
    // Shared with the table so tids stay unique kernel-wide
    next_tid: Arc<AtomicU32>,
}

impl Process {
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn address_space(&self) -> &AddressSpace {
        &self.memory
    }

    pub fn spawn_thread(&self, name: impl Into<String>) -> Arc<Thread> {
        let tid = self.next_tid.fetch_add(1, Ordering::SeqCst);
        let thread = Arc::new(Thread::new(self.pid, tid, name));
        self.threads.write().insert(tid, Arc::clone(&thread));
        info!(
            "Spawned thread {} ({}) in PID {}",
            tid,
            thread.name(),
            self.pid
        );
        thread
    }

    pub fn thread(&self, tid: Tid) -> Option<Arc<Thread>> {
        self.threads.read().get(&tid).cloned()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.read().len()
    }
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("threads", &self.thread_count())
            .finish()
    }
}

/// Kernel-wide table of processes
pub struct ProcessTable {
    processes: DashMap<Pid, Arc<Process>, RandomState>,
    next_pid: AtomicU32,
    next_tid: Arc<AtomicU32>,
    user_memory_size: Size,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::with_user_memory(DEFAULT_USER_MEMORY_SIZE)
    }

    /// Table whose processes each get `user_memory_size` bytes of address space
    pub fn with_user_memory(user_memory_size: Size) -> Self {
        Self {
            processes: DashMap::with_hasher(RandomState::new()),
            next_pid: AtomicU32::new(1),
            next_tid: Arc::new(AtomicU32::new(1)),
            user_memory_size,
        }
    }

    pub fn spawn_process(&self, name: impl Into<String>) -> Arc<Process> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let process = Arc::new(Process {
            pid,
            name: name.into(),
            memory: AddressSpace::new(pid, self.user_memory_size),
            threads: RwLock::new(AHashMap::new()),
            next_tid: Arc::clone(&self.next_tid),
        });
        self.processes.insert(pid, Arc::clone(&process));
        info!(
            "Created process {} ({}) with {} bytes of user memory",
            pid,
            process.name(),
            self.user_memory_size
        );
        process
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ProcessTable {
    fn process(&self, pid: Pid) -> Option<Arc<Process>> {
        self.processes.get(&pid).map(|entry| Arc::clone(entry.value()))
    }
}
