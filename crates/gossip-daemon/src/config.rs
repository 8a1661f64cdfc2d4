//! Daemon configuration loaded from a JSON file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use gossip_core::GossipConfig;
use gossip_core::config::MAX_DATAGRAM_SIZE;
use serde::{Deserialize, Serialize};

/// Framing, header and GCM tag bytes on top of the RSA blocks
const DATAGRAM_OVERHEAD: usize = 512;

/// Main configuration for the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Gossip tunables
    #[serde(default)]
    pub gossip: GossipSettings,

    /// Modulus size used when a new cluster key has to be generated
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,

    /// How often the daemon logs a status line, in seconds (default: 30)
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipSettings {
    /// Gossip round period in milliseconds (default: 500)
    #[serde(default = "default_gossip_interval")]
    pub gossip_interval_ms: u64,

    /// Silence after which a peer is evicted, in seconds (default: 60)
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_secs: u64,

    /// Peers a push is forwarded to (default: 5)
    #[serde(default = "default_fanout")]
    pub fanout: usize,

    /// Largest datagram sent or accepted (default: 65507)
    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    #[serde(default = "default_sample_attempts")]
    pub sample_attempts_per_pick: usize,
}

impl Default for GossipSettings {
    fn default() -> Self {
        Self {
            gossip_interval_ms: default_gossip_interval(),
            stale_threshold_secs: default_stale_threshold(),
            fanout: default_fanout(),
            max_datagram_size: default_max_datagram_size(),
            sample_attempts_per_pick: default_sample_attempts(),
        }
    }
}

fn default_gossip_interval() -> u64 {
    500
}

fn default_stale_threshold() -> u64 {
    60
}

fn default_fanout() -> usize {
    5
}

fn default_max_datagram_size() -> usize {
    MAX_DATAGRAM_SIZE
}

fn default_sample_attempts() -> usize {
    64
}

fn default_key_bits() -> usize {
    2048
}

fn default_status_interval() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gossip: GossipSettings::default(),
            key_bits: default_key_bits(),
            status_interval_secs: default_status_interval(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults if it is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.gossip.gossip_interval_ms > 0, "gossip_interval_ms must be positive");
        anyhow::ensure!(
            self.gossip.stale_threshold_secs > 0,
            "stale_threshold_secs must be positive"
        );
        anyhow::ensure!(self.gossip.fanout > 0, "fanout must be positive");
        anyhow::ensure!(
            self.gossip.max_datagram_size <= MAX_DATAGRAM_SIZE,
            "max_datagram_size cannot exceed {}",
            MAX_DATAGRAM_SIZE
        );
        let floor = self.min_datagram_size();
        anyhow::ensure!(
            self.gossip.max_datagram_size >= floor,
            "max_datagram_size must be at least {} for {}-bit keys",
            floor,
            self.key_bits
        );
        anyhow::ensure!(self.status_interval_secs > 0, "status_interval_secs must be positive");
        Ok(())
    }

    /// Smallest datagram that fits an empty sealed message.
    ///
    /// Two wrapped key blocks plus two signatures, each one modulus wide,
    /// and room for framing and the GCM tag.
    fn min_datagram_size(&self) -> usize {
        4 * self.key_bits.div_ceil(8) + DATAGRAM_OVERHEAD
    }

    pub fn gossip_config(&self) -> GossipConfig {
        GossipConfig {
            gossip_interval: Duration::from_millis(self.gossip.gossip_interval_ms),
            stale_threshold: Duration::from_secs(self.gossip.stale_threshold_secs),
            fanout: self.gossip.fanout,
            max_datagram_size: self.gossip.max_datagram_size,
            sample_attempts_per_pick: self.gossip.sample_attempts_per_pick,
        }
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}
