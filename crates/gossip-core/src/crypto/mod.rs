//! Message security: signatures, hybrid encryption and the key pair.
//!
//! Outbound: sign header and body, then encrypt the signed message.
//! Inbound: decrypt, then verify both signatures. A datagram that fails
//! any step never reaches the engine.

pub mod hybrid;
pub mod keys;
pub mod signing;

pub use keys::{MIN_KEY_BITS, NodeKeys};

use crate::error::GossipError;
use crate::protocol::{EncryptedEnvelope, Message};
use rsa::rand_core::OsRng;

/// Seals outbound messages and opens inbound datagrams with the cluster key.
#[derive(Debug, Clone)]
pub struct SecureChannel {
    keys: NodeKeys,
    max_datagram_size: usize,
}

impl SecureChannel {
    pub fn new(keys: NodeKeys, max_datagram_size: usize) -> Self {
        Self {
            keys,
            max_datagram_size,
        }
    }

    pub fn keys(&self) -> &NodeKeys {
        &self.keys
    }

    /// Sign, encrypt and encode a message into a datagram.
    pub fn seal(&self, mut message: Message) -> Result<Vec<u8>, GossipError> {
        signing::sign(&mut message, self.keys.private())?;
        let envelope = hybrid::encrypt(&message, self.keys.public(), &mut OsRng)?;
        Ok(envelope.to_datagram(self.max_datagram_size)?)
    }

    /// Decode, decrypt and verify a received datagram.
    pub fn open(&self, datagram: &[u8]) -> Result<Message, GossipError> {
        let envelope = EncryptedEnvelope::from_datagram(datagram, self.max_datagram_size)?;
        let message = hybrid::decrypt(&envelope, self.keys.private())?;
        signing::verify(&message, self.keys.public())?;
        Ok(message)
    }
}
