//! Error taxonomy for the gossip core.
//!
//! Node setup failures (bind, key generation) surface to the caller of
//! `ClusterNode::start`/`bootstrap`. Failures while handling a single
//! datagram are logged and dropped by the engine.

use thiserror::Error;

/// Which of the two message signatures failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedPart {
    Header,
    Body,
}

impl std::fmt::Display for SignedPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::Body => f.write_str("body"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGenFailed(String),

    #[error("Signing failed: {0}")]
    SignFailed(String),

    #[error("Invalid {part} signature")]
    VerifyFailed { part: SignedPart },

    #[error("Encryption failed: {0}")]
    EncryptFailed(String),

    #[error("Decryption failed")]
    DecryptFailed,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Datagram too large ({size} > {limit} bytes)")]
    Oversized { size: usize, limit: usize },
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Bind failed for {address}: {reason}")]
    BindFailed { address: String, reason: String },

    #[error("Send to {address} failed: {reason}")]
    SendFailed { address: String, reason: String },

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(u8),

    #[error("Announced peer {announced} does not match sender {sender}")]
    SenderMismatch { sender: String, announced: String },

    #[error("Sender {0} is not a known peer")]
    UnknownSender(String),
}

/// Top-level error for gossip-core operations.
#[derive(Debug, Error)]
pub enum GossipError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, GossipError>;
