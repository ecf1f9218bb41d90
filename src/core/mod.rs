/*!
 * Core Module
 * Fundamental kernel types, limits, configuration and guards
 */

pub mod config;
pub mod guard;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use config::KernelConfig;
pub use guard::{Guard, GuardDrop, GuardError, GuardResult, MemoryAccessGuard};
pub use types::*;
