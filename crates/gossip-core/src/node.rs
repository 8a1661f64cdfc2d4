//! ClusterNode: a running gossip node.
//!
//! Owns two long-lived tasks:
//! - the receive loop, which hands every datagram to its own handler task
//! - the ticker, which runs one gossip round per `gossip_interval`
//!
//! Anything that seals or opens a datagram does RSA work, so it runs on the
//! blocking pool rather than an async worker.
//!
//! Both stop when the shutdown flag flips or the node is dropped.

use crate::config::NodeConfig;
use crate::crypto::NodeKeys;
use crate::engine::GossipEngine;
use crate::error::Result;
use crate::events::{ClusterEvent, Subscription};
use crate::membership::{PeerAddress, PeerRecord};
use crate::store::Value;
use crate::transport::{DatagramTransport, UdpTransport};
use crate::PeerId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct ClusterNode {
    engine: Arc<GossipEngine>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ClusterNode {
    /// Bind the gossip socket and start a singleton cluster.
    ///
    /// The advertised address uses the port actually bound, so port 0 works.
    pub async fn start(config: NodeConfig, keys: NodeKeys) -> Result<Self> {
        let transport = UdpTransport::bind(&config.host, config.port).await?;
        let bound = transport.local_addr()?;
        let transport: Arc<dyn DatagramTransport> = Arc::new(transport);

        let local = PeerRecord::new(
            PeerId::generate(),
            PeerAddress::new(config.host.clone(), bound.port()),
        );
        info!("Starting node {} on {}", local.id, local.address);

        let engine = Arc::new(GossipEngine::new(
            local,
            keys,
            Arc::clone(&transport),
            config.gossip,
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(receive_loop(
                Arc::clone(&engine),
                transport,
                shutdown_rx.clone(),
            )),
            tokio::spawn(tick_loop(Arc::clone(&engine), shutdown_rx)),
        ];

        Ok(Self {
            engine,
            shutdown,
            tasks,
        })
    }

    /// Start, then introduce ourselves to `contact`.
    pub async fn bootstrap(
        config: NodeConfig,
        contact: PeerAddress,
        keys: NodeKeys,
    ) -> Result<Self> {
        let node = Self::start(config, keys).await?;
        info!("Bootstrapping off {}", contact);
        let engine = Arc::clone(&node.engine);
        if let Err(e) = tokio::task::spawn_blocking(move || engine.send_bootstrap(&contact)).await {
            warn!("Bootstrap send task failed: {}", e);
        }
        Ok(node)
    }

    /// Stop both tasks and wait for them to exit.
    ///
    /// In-flight handler and send tasks are left to finish on their own.
    pub async fn shutdown(self) {
        info!("Shutting down node {}", self.local_id());
        let _ = self.shutdown.send(true);
        for result in futures::future::join_all(self.tasks).await {
            if let Err(e) = result {
                warn!("Node task ended abnormally: {}", e);
            }
        }
    }

    pub fn local_id(&self) -> &PeerId {
        self.engine.local_id()
    }

    pub fn local_address(&self) -> &PeerAddress {
        &self.engine.directory().local_record().address
    }

    /// Write a value locally. It spreads with the next gossip exchanges.
    pub fn put(&self, key: impl Into<String>, value: Value) {
        self.engine.store().insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.engine.store().get(key)
    }

    pub fn values(&self) -> BTreeMap<String, Value> {
        self.engine.store().snapshot()
    }

    /// Known peers, including this node, ordered by id.
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.engine.directory().records()
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(ClusterEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.engine.events().subscribe(callback)
    }

    pub fn engine(&self) -> &Arc<GossipEngine> {
        &self.engine
    }
}

async fn receive_loop(
    engine: Arc<GossipEngine>,
    transport: Arc<dyn DatagramTransport>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; engine.config().max_datagram_size];
    loop {
        tokio::select! {
            result = transport.recv_from(&mut buf) => match result {
                Ok((len, from)) => {
                    let data = buf[..len].to_vec();
                    let engine = Arc::clone(&engine);
                    debug!("Received {} bytes from {}", len, from);
                    tokio::task::spawn_blocking(move || engine.handle_datagram(&data));
                }
                Err(e) => warn!("{}", e),
            },
            _ = shutdown.changed() => break,
        }
    }
    debug!("Receive loop stopped");
}

async fn tick_loop(engine: Arc<GossipEngine>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(engine.config().gossip_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let engine = Arc::clone(&engine);
                if let Err(e) = tokio::task::spawn_blocking(move || engine.tick()).await {
                    warn!("Gossip round failed: {}", e);
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("Gossip ticker stopped");
}
