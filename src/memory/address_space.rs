/*!
 * Process Address Spaces
 *
 * Each simulated process owns a private byte arena. User pointers are plain
 * offsets into that arena and mean nothing in any other process.
 */

use super::layout::{self, UserStruct};
use super::types::{MemoryError, MemoryResult, UserPtr};
use crate::core::limits::{USER_ALLOCATION_ALIGN, USER_MEMORY_BASE};
use crate::core::types::{Address, Pid, Size};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::ops::Range;

/// Raw copy primitive: copy `len` bytes from `src` into `dst`
///
/// Fails instead of panicking when either side is shorter than `len`.
#[inline]
pub fn copy(dst: &mut [u8], src: &[u8], len: Size) -> MemoryResult<()> {
    if len > src.len() || len > dst.len() {
        return Err(MemoryError::CopyOverrun {
            len,
            src: src.len(),
            dst: dst.len(),
        });
    }
    dst[..len].copy_from_slice(&src[..len]);
    Ok(())
}

/// Backing storage of one address space
pub struct UserArena {
    pid: Pid,
    bytes: Vec<u8>,
    /// Live allocations: start address -> length
    allocations: BTreeMap<Address, Size>,
}

impl UserArena {
    fn new(pid: Pid, size: Size) -> Self {
        Self {
            pid,
            bytes: vec![0; size],
            allocations: BTreeMap::new(),
        }
    }

    #[inline]
    fn range(&self, ptr: UserPtr, len: Size) -> MemoryResult<Range<usize>> {
        let start = ptr.address();
        let out_of_bounds = MemoryError::OutOfBounds {
            pid: self.pid,
            address: start,
            len,
        };
        if start < USER_MEMORY_BASE {
            return Err(out_of_bounds);
        }
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(out_of_bounds),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn slice(&self, ptr: UserPtr, len: Size) -> MemoryResult<&[u8]> {
        let range = self.range(ptr, len)?;
        Ok(&self.bytes[range])
    }

    pub fn slice_mut(&mut self, ptr: UserPtr, len: Size) -> MemoryResult<&mut [u8]> {
        let range = self.range(ptr, len)?;
        Ok(&mut self.bytes[range])
    }

    pub fn read_struct<T: UserStruct>(&self, ptr: UserPtr) -> MemoryResult<T> {
        layout::decode(self.slice(ptr, T::SIZE)?, ptr.address())
    }

    pub fn write_struct<T: UserStruct>(&mut self, ptr: UserPtr, value: &T) -> MemoryResult<()> {
        let encoded = layout::encode(value, ptr.address())?;
        let target = self.slice_mut(ptr, T::SIZE)?;
        copy(target, &encoded, T::SIZE)
    }

    /// First-fit allocation, aligned to `USER_ALLOCATION_ALIGN`
    fn allocate(&mut self, len: Size) -> MemoryResult<UserPtr> {
        let len = len.max(1);
        let align = |addr: Address| (addr + USER_ALLOCATION_ALIGN - 1) & !(USER_ALLOCATION_ALIGN - 1);

        let mut candidate = USER_MEMORY_BASE;
        for (&start, &size) in &self.allocations {
            if candidate + len <= start {
                break;
            }
            candidate = align(start + size);
        }

        if candidate + len > self.bytes.len() {
            return Err(MemoryError::OutOfMemory {
                pid: self.pid,
                requested: len,
            });
        }

        self.allocations.insert(candidate, len);
        self.bytes[candidate..candidate + len].fill(0);
        Ok(UserPtr::new(candidate))
    }

    fn free(&mut self, ptr: UserPtr) -> MemoryResult<()> {
        self.allocations
            .remove(&ptr.address())
            .map(|_| ())
            .ok_or(MemoryError::InvalidAddress(ptr.address()))
    }

    fn allocated_bytes(&self) -> Size {
        self.allocations.values().sum()
    }
}

/// A process's private memory
///
/// Code running in the owning process uses the methods here directly. Kernel
/// code acting on behalf of another context must go through
/// [`CrossContextAccess`](super::CrossContextAccess).
pub struct AddressSpace {
    pid: Pid,
    arena: Mutex<UserArena>,
}

impl AddressSpace {
    pub fn new(pid: Pid, size: Size) -> Self {
        Self {
            pid,
            arena: Mutex::new(UserArena::new(pid, size)),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn allocate(&self, len: Size) -> MemoryResult<UserPtr> {
        self.arena.lock().allocate(len)
    }

    pub fn free(&self, ptr: UserPtr) -> MemoryResult<()> {
        self.arena.lock().free(ptr)
    }

    pub fn allocated_bytes(&self) -> Size {
        self.arena.lock().allocated_bytes()
    }

    pub fn read_bytes(&self, ptr: UserPtr, len: Size) -> MemoryResult<Vec<u8>> {
        Ok(self.arena.lock().slice(ptr, len)?.to_vec())
    }

    pub fn write_bytes(&self, ptr: UserPtr, data: &[u8]) -> MemoryResult<()> {
        let mut arena = self.arena.lock();
        let target = arena.slice_mut(ptr, data.len())?;
        copy(target, data, data.len())
    }

    pub fn read_struct<T: UserStruct>(&self, ptr: UserPtr) -> MemoryResult<T> {
        self.arena.lock().read_struct(ptr)
    }

    pub fn write_struct<T: UserStruct>(&self, ptr: UserPtr, value: &T) -> MemoryResult<()> {
        self.arena.lock().write_struct(ptr, value)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, UserArena> {
        self.arena.lock()
    }
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arena = self.arena.lock();
        f.debug_struct("AddressSpace")
            .field("pid", &self.pid)
            .field("size", &arena.bytes.len())
            .field("allocations", &arena.allocations.len())
            .finish()
    }
}
