/*!
 * Outpoint Registry
 *
 * Tracks every published outpoint, in registration order. Outpoints are
 * never removed, so an `OutpointId` stays valid for the life of the kernel.
 */

use super::super::requests::{ChannelDescriptor, WaitForConnectRequest};
use super::super::types::{IpcError, IpcResult, OutpointId, PipeClass, PipeSubclass};
use super::outpoint::Outpoint;
use crate::core::limits::UNLIMITED_CONNECTIONS;
use crate::core::types::{Pid, ThreadRef, Tid};
use crate::memory::{CrossContextAccess, UserPtr};
use crate::process::{ParamSlot, ReturnSlot, Scheduler};
use crate::syscalls::types::CallResult;
use log::{debug, info, warn};

#[derive(Debug, Default)]
pub struct OutpointRegistry {
    outpoints: Vec<Outpoint>,
}

impl OutpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outpoint, or return the existing one for the same triple
    pub fn register(
        &mut self,
        scheduler: &dyn Scheduler,
        owner: Pid,
        class: PipeClass,
        subclass: PipeSubclass,
        max_connections: i32,
    ) -> IpcResult<OutpointId> {
        if scheduler.process(owner).is_none() {
            return Err(IpcError::ProcessNotFound(owner));
        }
        if max_connections <= 0 && max_connections != UNLIMITED_CONNECTIONS {
            return Err(IpcError::InvalidMaxConnections(max_connections));
        }

        if let Some(existing) = self.find(owner, class, subclass) {
            debug!(
                "Outpoint {:?}/{:?} of PID {} already registered",
                class, subclass, owner
            );
            return Ok(existing);
        }

        let id = OutpointId(self.outpoints.len());
        self.outpoints
            .push(Outpoint::new(owner, class, subclass, max_connections));
        info!(
            "Registered outpoint {:?}/{:?} for PID {} (max connections: {})",
            class, subclass, owner, max_connections
        );
        Ok(id)
    }

    pub fn find(&self, owner: Pid, class: PipeClass, subclass: PipeSubclass) -> Option<OutpointId> {
        self.outpoints
            .iter()
            .position(|outpoint| outpoint.matches(owner, class, subclass))
            .map(OutpointId)
    }

    pub fn get(&self, id: OutpointId) -> Option<&Outpoint> {
        self.outpoints.get(id.0)
    }

    pub fn get_mut(&mut self, id: OutpointId) -> Option<&mut Outpoint> {
        self.outpoints.get_mut(id.0)
    }

    /// Outpoints of `class`/`subclass` that can still accept a connection
    pub fn available(
        &self,
        class: PipeClass,
        subclass: PipeSubclass,
    ) -> impl Iterator<Item = &Outpoint> + '_ {
        self.outpoints.iter().filter(move |outpoint| {
            outpoint.class == class && outpoint.subclass == subclass && outpoint.has_capacity()
        })
    }

    pub fn count_available(&self, class: PipeClass, subclass: PipeSubclass) -> usize {
        self.available(class, subclass).count()
    }

    /// Owners of up to `max` available outpoints, in registry order
    pub fn list_available(&self, class: PipeClass, subclass: PipeSubclass, max: usize) -> Vec<Pid> {
        self.available(class, subclass)
            .take(max)
            .map(|outpoint| outpoint.owner)
            .collect()
    }

    /// Queue `owner_thread` to be woken by the next connection to the outpoint
    ///
    /// Does not suspend the thread.
    pub fn register_wait(
        &mut self,
        scheduler: &dyn Scheduler,
        owner: Pid,
        owner_thread: Tid,
        class: PipeClass,
        subclass: PipeSubclass,
    ) -> IpcResult<OutpointId> {
        if scheduler.process(owner).is_none() {
            return Err(IpcError::ProcessNotFound(owner));
        }
        if scheduler.thread(owner, owner_thread).is_none() {
            return Err(IpcError::ThreadNotFound {
                pid: owner,
                tid: owner_thread,
            });
        }

        let id = self
            .find(owner, class, subclass)
            .ok_or(IpcError::OutpointNotFound {
                pid: owner,
                class,
                subclass,
            })?;
        let outpoint = &mut self.outpoints[id.0];
        outpoint.waiting.push_back(ThreadRef::new(owner, owner_thread));
        debug!(
            "Thread {}:{} waiting on outpoint {:?}/{:?} ({} waiting)",
            owner,
            owner_thread,
            class,
            subclass,
            outpoint.waiting.len()
        );
        Ok(id)
    }

    /// Wake every thread waiting on `id`, oldest first
    ///
    /// Each waiter's `WaitForConnectRequest` (address in its `Param1`) receives
    /// `descriptor`, and its return slots are completed before it is woken.
    pub fn wake_waiters(
        &mut self,
        id: OutpointId,
        descriptor: &ChannelDescriptor,
        scheduler: &dyn Scheduler,
        access: &CrossContextAccess,
    ) -> usize {
        let Some(outpoint) = self.outpoints.get_mut(id.0) else {
            return 0;
        };

        let mut woken = 0;
        while let Some(waiter) = outpoint.waiting.pop_front() {
            let (Some(process), Some(thread)) = (
                scheduler.process(waiter.pid),
                scheduler.thread(waiter.pid, waiter.tid),
            ) else {
                warn!("Connect waiter {} vanished before channel {}", waiter, descriptor.channel_id);
                continue;
            };

            let request_ptr = UserPtr::from(thread.param(ParamSlot::P1));
            let filled = access.with(process.address_space(), |guard| {
                let mut request: WaitForConnectRequest = guard.read_struct(request_ptr)?;
                request.result = *descriptor;
                guard.write_struct(request_ptr, &request)
            });

            match filled {
                Ok(()) => thread.set_returns(&[
                    (ReturnSlot::R1, CallResult::Ok.as_raw()),
                    (ReturnSlot::R2, u64::from(descriptor.channel_id)),
                ]),
                Err(e) => {
                    warn!(
                        "Could not deliver channel {} to waiter {}: {}",
                        descriptor.channel_id, waiter, e
                    );
                    thread.set_return(ReturnSlot::R1, CallResult::Fail.as_raw());
                }
            }
            thread.wake();
            woken += 1;
        }

        if woken > 0 {
            info!(
                "Woke {} connect waiter(s) of PID {} for channel {}",
                woken, descriptor.writer_pid, descriptor.channel_id
            );
        }
        woken
    }

    pub fn len(&self) -> usize {
        self.outpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outpoints.is_empty()
    }
}
