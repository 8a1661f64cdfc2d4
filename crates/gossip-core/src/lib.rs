//! gossip-core: secure epidemic membership and key-value replication.
//!
//! This crate provides:
//! - Signing and hybrid encryption of wire messages (`crypto`)
//! - Wire message types and the canonical codec (`protocol`)
//! - The membership directory with random peer sampling and age-out (`membership`)
//! - The replicated value store with timestamp-gated merging (`store`)
//! - The gossip protocol state machine (`engine`) and the `ClusterNode` facade (`node`)

pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod events;
pub mod membership;
pub mod node;
pub mod peer_id;
pub mod protocol;
pub mod store;
pub mod transport;

pub use config::{GossipConfig, NodeConfig};
pub use crypto::{NodeKeys, SecureChannel};
pub use engine::GossipEngine;
pub use error::{CodecError, CryptoError, GossipError, NetworkError, ProtocolError};
pub use events::{ClusterEvent, EventBus, Subscription};
pub use membership::{MembershipDirectory, PeerAddress, PeerRecord};
pub use node::ClusterNode;
pub use peer_id::PeerId;
pub use protocol::{GossipDigest, Message, MessageKind, Payload};
pub use store::{AttributeValue, ConflictMode, ReplicatedStore, Value};
pub use transport::{DatagramTransport, UdpTransport};
