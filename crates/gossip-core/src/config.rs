//! Tunables for the gossip engine and node.

use std::time::Duration;

/// UDP payload ceiling (65535 - 8 byte UDP header - 20 byte IP header).
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Configuration for gossip dissemination and failure detection.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// How often to pull from a random peer and age out stale peers (default: 500ms)
    pub gossip_interval: Duration,
    /// Peers not heard from for longer than this are evicted (default: 60s)
    pub stale_threshold: Duration,
    /// Max peers a push is re-broadcast to (default: 5)
    pub fanout: usize,
    /// Largest datagram we send or accept (default: 65507)
    pub max_datagram_size: usize,
    /// Rejection-sampling draws allowed per selected peer before giving up (default: 64)
    pub sample_attempts_per_pick: usize,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            gossip_interval: Duration::from_millis(500),
            stale_threshold: Duration::from_secs(60),
            fanout: 5,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            sample_attempts_per_pick: 64,
        }
    }
}

/// Where a node binds and how it gossips.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Host to bind and advertise
    pub host: String,
    /// Gossip port (0 picks an ephemeral port; the bound port is advertised)
    pub port: u16,
    pub gossip: GossipConfig,
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            gossip: GossipConfig::default(),
        }
    }

    pub fn with_gossip(mut self, gossip: GossipConfig) -> Self {
        self.gossip = gossip;
        self
    }
}
