//! Wire protocol for gossip exchanges.
//!
//! This module defines:
//! - Message kinds and the signed `Message` (header + encoded body)
//! - Per-kind payload shapes (`Payload`)
//! - The `EncryptedEnvelope` that actually crosses the network
//! - Canonical encoding (bincode) with bounded decoding

pub mod codec;
pub mod envelope;
pub mod message;

pub use codec::{decode, decode_bounded, encode};
pub use envelope::EncryptedEnvelope;
pub use message::{GossipDigest, Header, Message, MessageKind, Payload};
