/*!
 * User Structure Layout
 *
 * Structures exchanged by address between user code and the kernel are stored
 * in user memory with a fixed little-endian layout (bincode, fixed-width ints).
 */

use super::types::{MemoryError, MemoryResult};
use crate::core::types::Address;
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A structure with a fixed encoded size that can live in user memory
pub trait UserStruct: Serialize + DeserializeOwned {
    /// Encoded size in bytes
    const SIZE: usize;
}

#[inline]
fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Encode `value` into exactly `T::SIZE` bytes
pub fn encode<T: UserStruct>(value: &T, address: Address) -> MemoryResult<Vec<u8>> {
    let bytes = options().serialize(value).map_err(|e| MemoryError::Layout {
        address,
        reason: e.to_string(),
    })?;
    if bytes.len() != T::SIZE {
        return Err(MemoryError::Layout {
            address,
            reason: format!("encoded {} bytes, layout is {}", bytes.len(), T::SIZE),
        });
    }
    Ok(bytes)
}

/// Decode a `T` from exactly `T::SIZE` bytes
pub fn decode<T: UserStruct>(bytes: &[u8], address: Address) -> MemoryResult<T> {
    options().deserialize(bytes).map_err(|e| MemoryError::Layout {
        address,
        reason: e.to_string(),
    })
}
