/*!
 * Endpoint Types
 * Errors surfaced by the client handles
 */

use crate::memory::MemoryError;
use crate::syscalls::types::{CallResult, CallReturn, SyscallNumber};
use miette::Diagnostic;
use thiserror::Error;

pub type EndpointResult<T> = Result<T, EndpointError>;

/// Client-side view of a failed kernel call
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum EndpointError {
    #[error("Kernel did not handle {call}")]
    #[diagnostic(
        code(endpoint::unhandled),
        help("The kernel hit an internal integrity fault or does not know this call.")
    )]
    Unhandled { call: SyscallNumber },

    #[error("{call} failed")]
    #[diagnostic(code(endpoint::failed))]
    Failed { call: SyscallNumber },

    #[error("{call} could not complete without blocking")]
    #[diagnostic(code(endpoint::would_block), help("Retry later or issue a blocking call."))]
    WouldBlock { call: SyscallNumber },

    #[error("Buffer of {len} bytes cannot hold {needed} bytes")]
    #[diagnostic(code(endpoint::buffer_too_small))]
    BufferTooSmall { needed: usize, len: usize },

    #[error("Staging memory error: {0}")]
    #[diagnostic(code(endpoint::memory))]
    Memory(#[from] MemoryError),
}

impl EndpointError {
    /// Non-blocking failures are expected; everything else is not
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::WouldBlock { .. })
    }
}

/// Map a call's result code onto the client outcome
///
/// Returns `Return2` on success.
pub(crate) fn translate(call: SyscallNumber, ret: CallReturn, blocking: bool) -> EndpointResult<u64> {
    match ret.result {
        CallResult::Ok => Ok(ret.value()),
        CallResult::Fail if blocking => Err(EndpointError::Failed { call }),
        CallResult::Fail => Err(EndpointError::WouldBlock { call }),
        CallResult::Unhandled | CallResult::Deferred => Err(EndpointError::Unhandled { call }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate() {
        let call = SyscallNumber::ReadPipe;
        assert_eq!(
            translate(call, CallReturn::new(CallResult::Ok, [7, 0, 0]), true),
            Ok(7)
        );
        assert_eq!(
            translate(call, CallReturn::new(CallResult::Fail, [0; 3]), true),
            Err(EndpointError::Failed { call })
        );
        let would_block = translate(call, CallReturn::new(CallResult::Fail, [0; 3]), false);
        assert!(would_block.unwrap_err().is_recoverable());
        assert_eq!(
            translate(call, CallReturn::new(CallResult::Unhandled, [0; 3]), false),
            Err(EndpointError::Unhandled { call })
        );
    }
}
