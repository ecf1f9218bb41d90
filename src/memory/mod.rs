/*!
 * Memory Module
 * Per-process user memory and cross-context access
 */

pub mod access;
pub mod address_space;
pub mod layout;
pub mod types;

// Re-export for convenience
pub use access::CrossContextAccess;
pub use address_space::{copy, AddressSpace};
pub use layout::UserStruct;
pub use types::*;
