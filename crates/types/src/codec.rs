//! Encoding helpers shared by every wire type.

use serde::{de::DeserializeOwned, Serialize};

/// Encode a value with bcs.
pub fn encode<T: Serialize>(value: &T) -> bcs::Result<Vec<u8>> {
    bcs::to_bytes(value)
}

/// Decode bytes into a value.
pub fn try_decode<T: DeserializeOwned>(bytes: &[u8]) -> bcs::Result<T> {
    bcs::from_bytes(bytes)
}
