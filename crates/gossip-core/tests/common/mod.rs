//! Shared helpers for gossip-core integration tests.

#![allow(dead_code)]

use gossip_core::{ClusterNode, GossipConfig, NodeConfig, NodeKeys};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::time::Instant;

static CLUSTER_KEYS: LazyLock<NodeKeys> =
    LazyLock::new(|| NodeKeys::generate(2048).expect("test key generation"));

/// Key pair shared by every node in a test cluster.
pub fn cluster_keys() -> NodeKeys {
    CLUSTER_KEYS.clone()
}

/// Loopback node with a fast gossip tick.
pub fn fast_config() -> NodeConfig {
    NodeConfig::new("127.0.0.1", 0).with_gossip(GossipConfig {
        gossip_interval: Duration::from_millis(100),
        ..GossipConfig::default()
    })
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

pub async fn shutdown_all(nodes: Vec<ClusterNode>) {
    for node in nodes {
        node.shutdown().await;
    }
}
