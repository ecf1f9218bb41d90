/*!
 * Request Structures
 *
 * Structures passed by address between user code and the kernel. They live
 * in the caller's memory with the fixed layout described by `UserStruct`.
 */

use super::types::{ChannelId, PipeClass, PipeSubclass};
use crate::core::types::Pid;
use crate::memory::{UserPtr, UserStruct};
use serde::{Deserialize, Serialize};

/// Connection request against another process's outpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub class: PipeClass,
    pub subclass: PipeSubclass,
    /// Requested buffer capacity; 0 selects the kernel default
    pub buffer_size: u32,
    /// Filled in by the kernel
    pub channel_id: ChannelId,
}

impl UserStruct for CreateChannelRequest {
    const SIZE: usize = 16;
}

/// Read from a channel into the caller's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub channel_id: ChannelId,
    pub out_buffer: UserPtr,
    pub offset: u32,
    pub length: u32,
    pub blocking: bool,
    pub aborted: bool,
}

impl UserStruct for ReadRequest {
    const SIZE: usize = 22;
}

/// Write from the caller's buffer into a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    pub channel_id: ChannelId,
    pub in_buffer: UserPtr,
    pub offset: u32,
    pub length: u32,
    pub blocking: bool,
    pub aborted: bool,
}

impl UserStruct for WriteRequest {
    const SIZE: usize = 22;
}

/// Everything both sides need to know about an established channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub channel_id: ChannelId,
    pub buffer_size: u32,
    pub class: PipeClass,
    pub subclass: PipeSubclass,
    pub reader_pid: Pid,
    pub writer_pid: Pid,
}

impl UserStruct for ChannelDescriptor {
    const SIZE: usize = 24;
}

/// Wait on an own outpoint until a reader connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitForConnectRequest {
    pub class: PipeClass,
    pub subclass: PipeSubclass,
    /// Filled in by the kernel when the waiter is woken
    pub result: ChannelDescriptor,
}

impl WaitForConnectRequest {
    pub fn new(class: PipeClass, subclass: PipeSubclass) -> Self {
        Self {
            class,
            subclass,
            result: ChannelDescriptor {
                channel_id: 0,
                buffer_size: 0,
                class,
                subclass,
                reader_pid: 0,
                writer_pid: 0,
            },
        }
    }
}

impl UserStruct for WaitForConnectRequest {
    const SIZE: usize = 8 + ChannelDescriptor::SIZE;
}

/// List the processes offering outpoints of a class/subclass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEndpointsRequest {
    pub max_descriptors: u32,
    /// Array of `max_descriptors` [`EndpointDescriptor`]s
    pub out_descriptors: UserPtr,
}

impl UserStruct for ListEndpointsRequest {
    const SIZE: usize = 12;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub process_id: Pid,
}

impl UserStruct for EndpointDescriptor {
    const SIZE: usize = 4;
}
