//! Gossip message types.
//!
//! A `Message` is a header (kind + sender) and a body holding the canonical
//! encoding of the payload. The body is only decoded after the kind is known
//! and both signatures have been checked; the kind fixes the payload shape:
//!
//! | kind | name         | payload        |
//! |------|--------------|----------------|
//! | 0    | Bootstrap    | `PeerRecord`   |
//! | 1    | Push         | `GossipDigest` |
//! | 2    | PullRequest  | `GossipDigest` |
//! | 3    | PullResponse | `GossipDigest` |

use super::codec;
use crate::error::{CodecError, GossipError, ProtocolError};
use crate::membership::PeerRecord;
use crate::store::Value;
use crate::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gossip message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Joining node introduces itself to one contact
    Bootstrap = 0,
    /// Unsolicited digest; re-broadcast only when it taught us a new peer
    Push = 1,
    /// Periodic anti-entropy request carrying our digest
    PullRequest = 2,
    /// Direct reply to a PullRequest; never forwarded
    PullResponse = 3,
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Bootstrap),
            1 => Ok(Self::Push),
            2 => Ok(Self::PullRequest),
            3 => Ok(Self::PullResponse),
            other => Err(ProtocolError::UnknownMessageKind(other)),
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> u8 {
        kind as u8
    }
}

/// Signed message header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Raw kind byte; unknown values survive decoding so they can be reported
    kind: u8,
    pub sender: PeerId,
}

impl Header {
    pub fn new(kind: MessageKind, sender: PeerId) -> Self {
        Self {
            kind: kind.into(),
            sender,
        }
    }

    pub fn kind(&self) -> Result<MessageKind, ProtocolError> {
        MessageKind::try_from(self.kind)
    }

    pub fn raw_kind(&self) -> u8 {
        self.kind
    }
}

/// Full view of a node's membership and values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipDigest {
    pub peers: Vec<PeerRecord>,
    pub values: BTreeMap<String, Value>,
}

impl GossipDigest {
    pub fn new(peers: Vec<PeerRecord>, values: BTreeMap<String, Value>) -> Self {
        Self { peers, values }
    }
}

/// Decoded message body, one shape per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bootstrap(PeerRecord),
    Push(GossipDigest),
    PullRequest(GossipDigest),
    PullResponse(GossipDigest),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Bootstrap(_) => MessageKind::Bootstrap,
            Self::Push(_) => MessageKind::Push,
            Self::PullRequest(_) => MessageKind::PullRequest,
            Self::PullResponse(_) => MessageKind::PullResponse,
        }
    }

    fn encode_body(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Bootstrap(peer) => codec::encode(peer),
            Self::Push(digest) | Self::PullRequest(digest) | Self::PullResponse(digest) => {
                codec::encode(digest)
            }
        }
    }

    fn decode_body(kind: MessageKind, body: &[u8]) -> Result<Self, CodecError> {
        Ok(match kind {
            MessageKind::Bootstrap => Self::Bootstrap(codec::decode(body)?),
            MessageKind::Push => Self::Push(codec::decode(body)?),
            MessageKind::PullRequest => Self::PullRequest(codec::decode(body)?),
            MessageKind::PullResponse => Self::PullResponse(codec::decode(body)?),
        })
    }
}

/// A gossip message with detached header and body signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub header: Header,
    /// Canonical encoding of the payload
    pub body: Vec<u8>,
    pub header_signature: Vec<u8>,
    pub body_signature: Vec<u8>,
}

impl Message {
    /// Build an unsigned message.
    pub fn new(sender: PeerId, payload: &Payload) -> Result<Self, CodecError> {
        Ok(Self {
            header: Header::new(payload.kind(), sender),
            body: payload.encode_body()?,
            header_signature: Vec::new(),
            body_signature: Vec::new(),
        })
    }

    pub fn sender(&self) -> &PeerId {
        &self.header.sender
    }

    pub fn kind(&self) -> Result<MessageKind, ProtocolError> {
        self.header.kind()
    }

    pub fn is_signed(&self) -> bool {
        !self.header_signature.is_empty() && !self.body_signature.is_empty()
    }

    /// Decode the body according to the header's kind.
    ///
    /// Only call this on a verified message.
    pub fn payload(&self) -> Result<Payload, GossipError> {
        let kind = self.kind()?;
        Ok(Payload::decode_body(kind, &self.body)?)
    }
}
