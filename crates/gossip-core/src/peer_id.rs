//! PeerId: opaque identifier for a node in the cluster.
//!
//! Assigned once at node creation as a random UUID string. The id is
//! self-asserted: nothing binds it to the node's signing key.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeerIdError {
    #[error("Peer ID cannot be empty")]
    Empty,
    #[error("Peer ID contains whitespace: {0:?}")]
    Whitespace(String),
}

/// A unique identifier for a peer in the gossip cluster.
///
/// # Examples
/// ```
/// use gossip_core::PeerId;
///
/// let peer_id = PeerId::generate();
/// let parsed: PeerId = peer_id.to_string().parse().unwrap();
/// assert_eq!(peer_id, parsed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Generate a new random peer ID (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PeerIdError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(PeerIdError::Whitespace(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
