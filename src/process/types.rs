/*!
 * Process Types
 * Thread states and per-thread call slots
 */

use serde::{Deserialize, Serialize};

/// Scheduling state of a kernel thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    /// On the run queue
    Runnable,
    /// Off the run queue until explicitly woken
    Sleeping,
}

/// Call parameter slots (`Param1..3`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSlot {
    P1 = 0,
    P2 = 1,
    P3 = 2,
}

/// Call return slots (`Return1..4`); `R1` always carries the result code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnSlot {
    R1 = 0,
    R2 = 1,
    R3 = 2,
    R4 = 3,
}

/// Values passed across the kernel call boundary for one thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallSlots {
    pub params: [u64; 3],
    pub returns: [u64; 4],
}

impl CallSlots {
    #[inline]
    pub fn param(&self, slot: ParamSlot) -> u64 {
        self.params[slot as usize]
    }

    #[inline]
    pub fn ret(&self, slot: ReturnSlot) -> u64 {
        self.returns[slot as usize]
    }

    #[inline]
    pub fn set_ret(&mut self, slot: ReturnSlot, value: u64) {
        self.returns[slot as usize] = value;
    }
}
