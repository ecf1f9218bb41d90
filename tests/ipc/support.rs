/*!
 * Shared helpers for the IPC integration tests
 */

use ipc_kernel::core::limits::{STATE_POLL_INTERVAL, STATE_POLL_TIMEOUT};
use ipc_kernel::{Kernel, KernelConfig, Pid, Process, Thread, ThreadState};
use std::sync::Arc;
use std::time::Instant;

pub fn boot() -> Arc<Kernel> {
    boot_with(KernelConfig::default().with_user_memory_size(256 * 1024))
}

pub fn boot_with(config: KernelConfig) -> Arc<Kernel> {
    Arc::new(Kernel::new(config).expect("kernel boots"))
}

pub fn spawn(kernel: &Kernel, name: &str) -> (Arc<Process>, Arc<Thread>) {
    let process = kernel.processes().spawn_process(name);
    let thread = process.spawn_thread("main");
    (process, thread)
}

/// Poll `condition` until it holds or the state poll timeout expires
pub fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + STATE_POLL_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(STATE_POLL_INTERVAL);
    }
    condition()
}

pub fn wait_until_sleeping(thread: &Thread) {
    assert!(
        eventually(|| thread.state() == ThreadState::Sleeping),
        "thread {} never went to sleep",
        thread.id()
    );
}

pub fn wait_for_waiter(kernel: &Kernel, owner: Pid) {
    use ipc_kernel::{PipeClass, PipeSubclass};
    assert!(
        eventually(|| kernel
            .pipes()
            .waiting_count(owner, PipeClass::Standard, PipeSubclass::Out)
            > 0),
        "PID {} never waited for a connection",
        owner
    );
}
