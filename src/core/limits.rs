/*!
 * System Limits and Constants
 *
 * Centralized location for the IPC core's limits, thresholds, and magic numbers.
 * Organized by domain for maintainability and discoverability.
 */

use std::time::Duration;

// =============================================================================
// PIPE LIMITS
// =============================================================================

/// Default pipe buffer capacity (4KB)
/// Used when a connection request asks for a zero-sized buffer
pub const DEFAULT_PIPE_BUFFER_SIZE: usize = 4096;

/// Maximum pipe buffer capacity (1MB)
pub const MAX_PIPE_BUFFER_SIZE: usize = 1024 * 1024;

/// Bytes of every pipe buffer that are never filled.
/// A pipe of capacity C accepts at most C - 1 bytes before a read.
pub const PIPE_BUFFER_MARGIN: usize = 1;

/// Sentinel for "no connection limit" on an outpoint
pub const UNLIMITED_CONNECTIONS: i32 = -1;

/// First channel id handed out by a fresh pipe manager
pub const FIRST_CHANNEL_ID: u32 = 1;

// =============================================================================
// DEFERRED CALLS
// =============================================================================

/// Number of reusable deferred-call records (one per concurrently deferred thread)
pub const DEFERRED_CALL_POOL_SIZE: usize = 256;

/// Name given to the completion worker's OS thread
pub const DEFERRED_WORKER_NAME: &str = "deferred-calls";

// =============================================================================
// USER MEMORY
// =============================================================================

/// Size of each simulated process address space (1MB)
pub const DEFAULT_USER_MEMORY_SIZE: usize = 1024 * 1024;

/// First valid user address; everything below is unmapped so 0 stays null
pub const USER_MEMORY_BASE: usize = 0x1000;

/// Alignment of every user allocation
pub const USER_ALLOCATION_ALIGN: usize = 8;

// =============================================================================
// TESTING / DIAGNOSTICS
// =============================================================================

/// How long diagnostics wait for a worker to reach an expected state
pub const STATE_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Polling interval used together with STATE_POLL_TIMEOUT
pub const STATE_POLL_INTERVAL: Duration = Duration::from_millis(1);
