/*!
 * Cross-Context Memory Access
 *
 * Kernel code that must dereference a pointer belonging to another process
 * maps that process's address space for the duration of a guard. Only one
 * foreign address space may be mapped at a time.
 */

use super::address_space::AddressSpace;
use super::types::{MemoryError, MemoryResult};
use crate::core::guard::MemoryAccessGuard;
use crate::core::types::Pid;
use log::error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tracks which process (if any) is currently mapped into the kernel context
#[derive(Debug, Default)]
pub struct CrossContextAccess {
    mapped: Mutex<Option<Pid>>,
    enables: AtomicU64,
}

impl CrossContextAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `space` into the current kernel context
    ///
    /// Enabling while another mapping is live is an integrity fault.
    pub fn enable<'a>(&'a self, space: &'a AddressSpace) -> MemoryResult<MemoryAccessGuard<'a>> {
        let pid = space.pid();
        {
            let mut mapped = self.mapped.lock();
            if let Some(current) = *mapped {
                error!(
                    "Cross-context access to PID {} requested while PID {} is mapped",
                    pid, current
                );
                return Err(MemoryError::AccessAlreadyEnabled {
                    current,
                    requested: pid,
                });
            }
            *mapped = Some(pid);
        }
        self.enables.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryAccessGuard::new(pid, space.lock(), self))
    }

    /// Scoped form of [`enable`](Self::enable): the mapping lives exactly as long as `f`
    pub fn with<R>(
        &self,
        space: &AddressSpace,
        f: impl FnOnce(&mut MemoryAccessGuard<'_>) -> MemoryResult<R>,
    ) -> MemoryResult<R> {
        let mut guard = self.enable(space)?;
        f(&mut guard)
    }

    pub(crate) fn disable(&self, pid: Pid) {
        let mut mapped = self.mapped.lock();
        if *mapped != Some(pid) {
            error!(
                "Unmapping PID {} but mapped context is {:?}",
                pid, *mapped
            );
        }
        *mapped = None;
    }

    /// Process currently mapped, if any
    pub fn mapped(&self) -> Option<Pid> {
        *self.mapped.lock()
    }

    /// Number of mappings opened so far
    pub fn enable_count(&self) -> u64 {
        self.enables.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::UserPtr;

    #[test]
    fn test_guard_unmaps_on_drop() {
        let access = CrossContextAccess::new();
        let space = AddressSpace::new(3, 64 * 1024);
        let ptr = space.allocate(4).unwrap();

        {
            let mut guard = access.enable(&space).unwrap();
            assert_eq!(access.mapped(), Some(3));
            guard.slice_mut(ptr, 4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        }

        assert_eq!(access.mapped(), None);
        assert_eq!(space.read_bytes(ptr, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_nested_enable_is_rejected() {
        let access = CrossContextAccess::new();
        let a = AddressSpace::new(1, 64 * 1024);
        let b = AddressSpace::new(2, 64 * 1024);

        let _guard = access.enable(&a).unwrap();
        assert_eq!(
            access.enable(&b).err(),
            Some(MemoryError::AccessAlreadyEnabled {
                current: 1,
                requested: 2
            })
        );
    }

    #[test]
    fn test_scoped_access_released_on_error() {
        let access = CrossContextAccess::new();
        let space = AddressSpace::new(5, 64 * 1024);

        let result = access.with(&space, |guard| guard.slice(UserPtr::NULL, 1).map(|_| ()));
        assert!(result.is_err());
        assert_eq!(access.mapped(), None);
        assert_eq!(access.enable_count(), 1);
    }
}
