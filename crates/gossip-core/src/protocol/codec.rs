//! Canonical encoding.
//!
//! All wire structures are encoded with bincode (fixed-width integers,
//! little endian). Maps on the wire are `BTreeMap`s, so equal values always
//! encode to equal bytes, which is what the signatures are computed over.

use crate::error::CodecError;
use bincode::Options;
use serde::{Serialize, de::DeserializeOwned};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

/// Encode a value canonically.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    options()
        .serialize(value)
        .map_err(|e| CodecError::EncodeFailed(e.to_string()))
}

/// Decode a value with no size bound beyond the input itself.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, CodecError> {
    options()
        .deserialize(data)
        .map_err(|e| CodecError::DecodeFailed(e.to_string()))
}

/// Decode untrusted input, refusing anything over `limit` bytes.
///
/// The limit also caps allocations made while decoding, so a forged length
/// prefix cannot make us reserve more than `limit` bytes.
pub fn decode_bounded<T: DeserializeOwned>(data: &[u8], limit: usize) -> Result<T, CodecError> {
    if data.len() > limit {
        return Err(CodecError::Oversized {
            size: data.len(),
            limit,
        });
    }
    options()
        .with_limit(limit as u64)
        .deserialize(data)
        .map_err(|e| CodecError::DecodeFailed(e.to_string()))
}
