//! Peer identity and address types carried on the wire.

use crate::PeerId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Network location of a peer.
///
/// Each peer owns two adjacent ports: `port` for gossip datagrams and
/// `port + 1` reserved for bulk transfer, which the core never binds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub host: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Gossip endpoint as `host:port`.
    pub fn gossip_endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Port reserved for the bulk-transfer channel.
    pub fn transfer_port(&self) -> Option<u16> {
        self.port.checked_add(1)
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A known peer: who it claims to be and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: PeerId,
    pub address: PeerAddress,
}

impl PeerRecord {
    pub fn new(id: PeerId, address: PeerAddress) -> Self {
        Self { id, address }
    }
}
