/*!
 * Staging Allocations
 * Scoped user-memory allocations for request structures and data buffers
 */

use crate::core::types::Size;
use crate::memory::{AddressSpace, MemoryResult, UserPtr, UserStruct};
use log::warn;

/// Allocation in the calling process's memory, freed on drop
pub(crate) struct Staging<'a> {
    space: &'a AddressSpace,
    ptr: UserPtr,
}

impl<'a> Staging<'a> {
    pub(crate) fn bytes(space: &'a AddressSpace, len: Size) -> MemoryResult<Self> {
        let ptr = space.allocate(len)?;
        Ok(Self { space, ptr })
    }

    pub(crate) fn with_struct<T: UserStruct>(space: &'a AddressSpace, value: &T) -> MemoryResult<Self> {
        let staging = Self::bytes(space, T::SIZE)?;
        space.write_struct(staging.ptr, value)?;
        Ok(staging)
    }

    #[inline]
    pub(crate) fn ptr(&self) -> UserPtr {
        self.ptr
    }

    pub(crate) fn read<T: UserStruct>(&self) -> MemoryResult<T> {
        self.space.read_struct(self.ptr)
    }
}

impl Drop for Staging<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.space.free(self.ptr) {
            warn!("Leaked staging allocation {} in PID {}: {}", self.ptr, self.space.pid(), e);
        }
    }
}
