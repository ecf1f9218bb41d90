/*!
 * Process Module
 * Process/thread table, call slots, suspension and wake-up
 */

pub mod table;
pub mod thread;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use table::{Process, ProcessTable};
pub use thread::Thread;
pub use traits::Scheduler;
pub use types::{CallSlots, ParamSlot, ReturnSlot, ThreadState};
