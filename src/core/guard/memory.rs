/*!
 * Memory Access Guards
 *
 * RAII guard for a foreign address space mapped into the current kernel
 * context. The mapping is released on drop, so no exit path can leak it.
 */

use super::traits::{Guard, GuardDrop};
use super::{GuardError, GuardMetadata, GuardResult};
use crate::core::types::{Pid, Size};
use crate::memory::address_space::UserArena;
use crate::memory::layout::UserStruct;
use crate::memory::{CrossContextAccess, MemoryError, MemoryResult, UserPtr};
use parking_lot::MutexGuard;
use std::marker::PhantomData;

/// Scoped access to another process's memory
///
/// The guard is `!Send` and borrows both the access tracker and the target
/// address space, so it cannot be stashed away and carried across a point
/// where the holding thread is suspended.
///
/// # Example
///
/// ```ignore
/// let mut guard = access.enable(process.address_space())?;
/// guard.slice_mut(ptr, len)?.copy_from_slice(&data);
/// // Unmapped on drop
/// ```
pub struct MemoryAccessGuard<'a> {
    pid: Pid,
    arena: Option<MutexGuard<'a, UserArena>>,
    tracker: &'a CrossContextAccess,
    metadata: GuardMetadata,
    _not_send: PhantomData<*const ()>,
}

impl<'a> MemoryAccessGuard<'a> {
    pub(crate) fn new(
        pid: Pid,
        arena: MutexGuard<'a, UserArena>,
        tracker: &'a CrossContextAccess,
    ) -> Self {
        Self {
            pid,
            arena: Some(arena),
            tracker,
            metadata: GuardMetadata::new("memory_access").with_pid(pid),
            _not_send: PhantomData,
        }
    }

    /// Process whose memory is mapped
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    fn arena(&self) -> MemoryResult<&UserArena> {
        self.arena
            .as_deref()
            .ok_or(MemoryError::AccessReleased(self.pid))
    }

    #[inline]
    fn arena_mut(&mut self) -> MemoryResult<&mut UserArena> {
        self.arena
            .as_deref_mut()
            .ok_or(MemoryError::AccessReleased(self.pid))
    }

    pub fn slice(&self, ptr: UserPtr, len: Size) -> MemoryResult<&[u8]> {
        self.arena()?.slice(ptr, len)
    }

    pub fn slice_mut(&mut self, ptr: UserPtr, len: Size) -> MemoryResult<&mut [u8]> {
        self.arena_mut()?.slice_mut(ptr, len)
    }

    pub fn read_struct<T: UserStruct>(&self, ptr: UserPtr) -> MemoryResult<T> {
        self.arena()?.read_struct(ptr)
    }

    pub fn write_struct<T: UserStruct>(&mut self, ptr: UserPtr, value: &T) -> MemoryResult<()> {
        self.arena_mut()?.write_struct(ptr, value)
    }
}

impl Guard for MemoryAccessGuard<'_> {
    fn resource_type(&self) -> &'static str {
        "memory_access"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.arena.is_some()
    }

    fn release(&mut self) -> GuardResult<()> {
        if self.arena.take().is_none() {
            return Err(GuardError::AlreadyReleased);
        }
        self.tracker.disable(self.pid);
        log::trace!(
            "Unmapped PID {} after {}us",
            self.pid,
            self.metadata.lifetime_micros()
        );
        Ok(())
    }
}

impl GuardDrop for MemoryAccessGuard<'_> {
    fn on_drop(&mut self) {
        if self.is_active() {
            if let Err(e) = self.release() {
                log::error!("Memory access guard drop failed for PID {}: {}", self.pid, e);
            }
        }
    }
}

impl Drop for MemoryAccessGuard<'_> {
    fn drop(&mut self) {
        self.on_drop();
    }
}
