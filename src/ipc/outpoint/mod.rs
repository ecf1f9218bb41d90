/*!
 * Outpoint Module
 * Endpoint registry for publishable receive-side capabilities
 */

pub mod outpoint;
pub mod registry;

// Re-export public API
pub use outpoint::{Outpoint, OutpointStats};
pub use registry::OutpointRegistry;
