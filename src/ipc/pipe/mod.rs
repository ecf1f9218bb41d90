/*!
 * Pipe Module
 * Bounded single-buffer pipes between a writer and a reader process
 */

pub mod manager;
pub mod pipe;
pub mod types;

// Re-export public API
pub use manager::PipeManager;
pub use pipe::Pipe;
pub use types::{BufferError, ChannelStats, QueuedOp, RwResult};
