/*!
 * Tracing initialization
 */

use ipc_kernel::init_tracing;
use ipc_kernel::monitoring::generate_trace_id;
use serial_test::serial;

#[test]
#[serial]
fn test_init_tracing_is_idempotent() {
    // Another test binary or harness may already own the global subscriber
    let _ = init_tracing();
    assert!(!init_tracing());
}

#[test]
fn test_trace_ids_are_unique() {
    let first = generate_trace_id();
    let second = generate_trace_id();
    assert_ne!(first, second);
    assert!(!first.is_empty());
}
