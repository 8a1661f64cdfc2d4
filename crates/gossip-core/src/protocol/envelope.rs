//! Encrypted envelope: the only thing that crosses the network.

use super::codec;
use crate::error::CodecError;
use serde::{Deserialize, Serialize};

/// A hybrid-encrypted, signed `Message`.
///
/// `ciphertext` is AES-256-GCM over the encoded message (tag appended);
/// the symmetric key and nonce are each RSA-OAEP wrapped for the recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub wrapped_nonce: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Encode for sending, failing if the datagram would exceed `limit`.
    pub fn to_datagram(&self, limit: usize) -> Result<Vec<u8>, CodecError> {
        let bytes = codec::encode(self)?;
        if bytes.len() > limit {
            return Err(CodecError::Oversized {
                size: bytes.len(),
                limit,
            });
        }
        Ok(bytes)
    }

    /// Parse a received datagram. Fails closed on oversized or malformed input.
    pub fn from_datagram(data: &[u8], limit: usize) -> Result<Self, CodecError> {
        codec::decode_bounded(data, limit)
    }
}
