/*!
 * Call Result Types
 * Result codes written to `Return1` and the values user code gets back
 */

use serde::{Deserialize, Serialize};

/// Kernel call result code
///
/// `Deferred` never reaches user code: a deferred call is resolved to one of
/// the other codes before the calling thread runs again.
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallResult {
    Unhandled = 0,
    Ok = 1,
    Deferred = 2,
    Fail = 3,
}

impl CallResult {
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self as u64
    }

    /// Decode a `Return1` value; anything unknown is treated as `Unhandled`
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        match raw {
            1 => Self::Ok,
            2 => Self::Deferred,
            3 => Self::Fail,
            _ => Self::Unhandled,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// What the calling thread finds in its return slots when it resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CallReturn {
    pub result: CallResult,
    /// `Return2..4`
    pub values: [u64; 3],
}

impl CallReturn {
    #[inline]
    #[must_use]
    pub const fn new(result: CallResult, values: [u64; 3]) -> Self {
        Self { result, values }
    }

    /// `Return2`
    #[inline]
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.values[0]
    }
}
