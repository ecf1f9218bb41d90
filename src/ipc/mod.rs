/*!
 * IPC Module
 * Inter-process communication: outpoints, pipes and the structures passed between them
 */

pub mod outpoint;
pub mod pipe;
pub mod requests;
pub mod types;

// Re-export for convenience
pub use outpoint::{Outpoint, OutpointRegistry, OutpointStats};
pub use pipe::{ChannelStats, PipeManager, RwResult};
pub use requests::{
    ChannelDescriptor, CreateChannelRequest, EndpointDescriptor, ListEndpointsRequest,
    ReadRequest, WaitForConnectRequest, WriteRequest,
};
pub use types::{ChannelId, IpcError, IpcResult, OutpointId, PipeClass, PipeSubclass};
