/*!
 * IPC subsystem tests entry point
 */

#[path = "ipc/support.rs"]
mod support;

#[path = "ipc/scenario_test.rs"]
mod scenario_test;

#[path = "ipc/fifo_test.rs"]
mod fifo_test;

#[path = "ipc/kernel_call_test.rs"]
mod kernel_call_test;

#[path = "ipc/abort_test.rs"]
mod abort_test;

#[path = "ipc/tracing_test.rs"]
mod tracing_test;
