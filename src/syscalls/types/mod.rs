/*!
 * Syscall Types
 * Call numbers, result codes and errors
 */

pub mod errors;
pub mod results;
pub mod syscall;

pub use errors::{BootError, DeferredError};
pub use results::{CallResult, CallReturn};
pub use syscall::SyscallNumber;
