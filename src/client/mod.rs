/*!
 * Client Endpoint Handles
 * Request/response wrappers user code uses to talk to the pipe IPC calls
 */

pub mod inpoint;
pub mod outpoint;
mod staging;
pub mod types;

pub use inpoint::BasicInpoint;
pub use outpoint::BasicOutpoint;
pub use types::{EndpointError, EndpointResult};
