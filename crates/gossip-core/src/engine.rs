//! GossipEngine: the gossip protocol state machine.
//!
//! The protocol is stateless per message:
//!
//! 1. A joining node sends Bootstrap to one contact. The contact adopts it,
//!    replies with a Push of its full digest and pushes the same digest to
//!    up to `fanout` other peers.
//! 2. On Push, values are merged and peers adopted. Only when a new peer was
//!    learned is a fresh digest forwarded to up to `fanout` peers, so
//!    redundant digests die out after one hop.
//! 3. Every tick, one random peer gets a PullRequest and stale peers are
//!    evicted. The peer answers with a PullResponse, which is never forwarded.
//!
//! Every send is fire-and-forget: failures are logged and dropped, and an
//! unreachable peer only leaves the directory by aging out.

use crate::config::GossipConfig;
use crate::crypto::{NodeKeys, SecureChannel};
use crate::error::{GossipError, ProtocolError};
use crate::events::{ClusterEvent, EventBus};
use crate::membership::{MembershipDirectory, PeerAddress, PeerRecord};
use crate::protocol::{GossipDigest, Message, Payload};
use crate::store::{ReplicatedStore, Value};
use crate::transport::DatagramTransport;
use crate::PeerId;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state and handlers for one gossip node.
///
/// Wrap in `Arc` and hand a clone to every receive and tick task.
pub struct GossipEngine {
    directory: MembershipDirectory,
    store: ReplicatedStore,
    channel: SecureChannel,
    transport: Arc<dyn DatagramTransport>,
    config: GossipConfig,
    events: Arc<EventBus>,
}

impl GossipEngine {
    pub fn new(
        local: PeerRecord,
        keys: NodeKeys,
        transport: Arc<dyn DatagramTransport>,
        config: GossipConfig,
    ) -> Self {
        Self {
            directory: MembershipDirectory::new(local)
                .with_sample_attempts(config.sample_attempts_per_pick),
            store: ReplicatedStore::new(),
            channel: SecureChannel::new(keys, config.max_datagram_size),
            transport,
            config,
            events: Arc::new(EventBus::new()),
        }
    }

    pub fn local_id(&self) -> &PeerId {
        self.directory.local_id()
    }

    pub fn directory(&self) -> &MembershipDirectory {
        &self.directory
    }

    pub fn store(&self) -> &ReplicatedStore {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    /// Current peers and values.
    ///
    /// Reads the directory, releases it, then reads the store.
    pub fn digest(&self) -> GossipDigest {
        let peers = self.directory.records();
        let values = self.store.snapshot();
        GossipDigest::new(peers, values)
    }

    /// Handle one inbound datagram. Failures drop the datagram.
    pub fn handle_datagram(&self, data: &[u8]) {
        if let Err(e) = self.process_datagram(data) {
            debug!("Dropped inbound datagram ({} bytes): {}", data.len(), e);
            self.events.emit(ClusterEvent::MessageDropped {
                reason: e.to_string(),
            });
        }
    }

    fn process_datagram(&self, data: &[u8]) -> Result<(), GossipError> {
        let message = self.channel.open(data)?;
        let sender = message.sender().clone();
        self.directory.touch(&sender);

        let handled = match message.payload()? {
            Payload::Bootstrap(record) => self.on_bootstrap(&sender, record),
            Payload::Push(digest) => {
                self.on_push(&sender, digest);
                Ok(())
            }
            Payload::PullRequest(digest) => self.on_pull_request(&sender, digest),
            Payload::PullResponse(digest) => {
                self.on_pull_response(digest);
                Ok(())
            }
        };

        // Again, in case this message is what adopted the sender
        self.directory.touch(&sender);
        handled
    }

    fn on_bootstrap(&self, sender: &PeerId, record: PeerRecord) -> Result<(), GossipError> {
        if record.id != *sender {
            return Err(ProtocolError::SenderMismatch {
                sender: sender.to_string(),
                announced: record.id.to_string(),
            }
            .into());
        }

        info!("Bootstrap from {} at {}", record.id, record.address);
        self.adopt_peers(vec![record.clone()]);

        // Known ids keep their first address
        let reply_to = self
            .directory
            .get(&record.id)
            .map_or(record.address, |known| known.address);
        let digest = self.digest();
        self.send(&reply_to, Payload::Push(digest.clone()));

        let excluding = HashSet::from([record.id]);
        self.fan_out(&excluding, digest);
        Ok(())
    }

    fn on_push(&self, sender: &PeerId, digest: GossipDigest) {
        self.merge_values(&digest.values);
        let adopted = self.adopt_peers(digest.peers);

        if !adopted.is_empty() {
            let excluding = HashSet::from([sender.clone()]);
            self.fan_out(&excluding, self.digest());
        }
    }

    fn on_pull_request(&self, sender: &PeerId, digest: GossipDigest) -> Result<(), GossipError> {
        self.merge_values(&digest.values);
        self.adopt_peers(digest.peers);

        let requester = self
            .directory
            .get(sender)
            .ok_or_else(|| ProtocolError::UnknownSender(sender.to_string()))?;
        self.send(&requester.address, Payload::PullResponse(self.digest()));
        Ok(())
    }

    fn on_pull_response(&self, digest: GossipDigest) {
        self.merge_values(&digest.values);
        self.adopt_peers(digest.peers);
    }

    fn merge_values(&self, incoming: &BTreeMap<String, Value>) {
        let changed = self.store.merge(incoming);
        if !changed.is_empty() {
            debug!("Merged {} values: {:?}", changed.len(), changed);
            self.events.emit(ClusterEvent::ValuesMerged { keys: changed });
        }
    }

    fn adopt_peers(&self, peers: Vec<PeerRecord>) -> Vec<PeerRecord> {
        let adopted = self.directory.upsert_all(peers);
        for record in &adopted {
            info!("Peer joined: {} at {}", record.id, record.address);
            self.events.emit(ClusterEvent::PeerJoined {
                peer_id: record.id.clone(),
                address: record.address.clone(),
            });
        }
        adopted
    }

    /// Push `digest` to up to `fanout` random peers outside `excluding`.
    fn fan_out(&self, excluding: &HashSet<PeerId>, digest: GossipDigest) {
        let targets = self.directory.sample_random(excluding, self.config.fanout);
        let mut sent = 0;
        for id in targets {
            // Evicted between sampling and lookup
            let Some(record) = self.directory.get(&id) else {
                continue;
            };
            self.send(&record.address, Payload::Push(digest.clone()));
            sent += 1;
        }
        debug!("Fanned out digest to {} peers", sent);
    }

    /// One gossip round: pull from a random peer, then age out stale peers.
    pub fn tick(&self) {
        if self.directory.len() > 1 {
            let target = self
                .directory
                .sample_random(&HashSet::new(), 1)
                .pop()
                .and_then(|id| self.directory.get(&id));
            if let Some(record) = target {
                self.send(&record.address, Payload::PullRequest(self.digest()));
            }
        }

        for peer_id in self.directory.evict_stale(self.config.stale_threshold) {
            info!("Peer evicted: {}", peer_id);
            self.events.emit(ClusterEvent::PeerEvicted { peer_id });
        }
    }

    /// Introduce ourselves to a contact.
    pub fn send_bootstrap(&self, contact: &PeerAddress) {
        let record = self.directory.local_record().clone();
        self.send(contact, Payload::Bootstrap(record));
    }

    /// Seal `payload` now and deliver it from a detached task.
    fn send(&self, target: &PeerAddress, payload: Payload) {
        let kind = payload.kind();
        let datagram = match Message::new(self.local_id().clone(), &payload)
            .map_err(GossipError::from)
            .and_then(|message| self.channel.seal(message))
        {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!("Failed to seal {:?} for {}: {}", kind, target, e);
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let target = target.clone();
        tokio::spawn(async move {
            if let Err(e) = transport.send_to(&target, &datagram).await {
                debug!("Send of {:?} failed: {}", kind, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::protocol::MessageKind;
    use crate::store::{AttributeValue, ConflictMode};
    use crate::testing::{cluster_keys, foreign_keys};
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    // ===== Recording transport =====

    struct RecordingTransport {
        sent: mpsc::UnboundedSender<(PeerAddress, Vec<u8>)>,
    }

    #[async_trait]
    impl DatagramTransport for RecordingTransport {
        fn local_addr(&self) -> Result<SocketAddr, NetworkError> {
            Ok(SocketAddr::from(([127, 0, 0, 1], 7000)))
        }

        async fn send_to(&self, target: &PeerAddress, data: &[u8]) -> Result<(), NetworkError> {
            let _ = self.sent.send((target.clone(), data.to_vec()));
            Ok(())
        }

        async fn recv_from(&self, _buf: &mut [u8]) -> Result<(usize, SocketAddr), NetworkError> {
            std::future::pending().await
        }
    }

    struct Harness {
        engine: GossipEngine,
        sent: mpsc::UnboundedReceiver<(PeerAddress, Vec<u8>)>,
        channel: SecureChannel,
    }

    impl Harness {
        fn new(config: GossipConfig) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let engine = GossipEngine::new(
                record("local", 7000),
                cluster_keys().clone(),
                Arc::new(RecordingTransport { sent: tx }),
                config,
            );
            Self {
                engine,
                sent: rx,
                channel: SecureChannel::new(cluster_keys().clone(), config_limit()),
            }
        }

        fn with_peers(count: u16) -> Self {
            let harness = Self::new(GossipConfig::default());
            for i in 0..count {
                harness.engine.directory().upsert(record(&format!("p{i}"), 8000 + i));
            }
            harness
        }

        fn deliver(&self, sender: &str, payload: Payload) {
            let message = Message::new(sender.parse().unwrap(), &payload).unwrap();
            let datagram = self.channel.seal(message).unwrap();
            self.engine.handle_datagram(&datagram);
        }

        /// Let spawned sends run, then collect what they sent.
        async fn drain(&mut self) -> Vec<(PeerAddress, Message)> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut out = Vec::new();
            while let Ok((target, datagram)) = self.sent.try_recv() {
                out.push((target, self.channel.open(&datagram).unwrap()));
            }
            out
        }
    }

    fn config_limit() -> usize {
        GossipConfig::default().max_datagram_size
    }

    fn record(id: &str, port: u16) -> PeerRecord {
        PeerRecord::new(id.parse().unwrap(), PeerAddress::new("127.0.0.1", port))
    }

    fn value(ts: u64, x: &str) -> Value {
        Value::with_timestamp(
            ts,
            ConflictMode::MergeKeepNewer,
            BTreeMap::from([("x".to_string(), AttributeValue::from(x))]),
        )
    }

    fn digest_of(peers: Vec<PeerRecord>, values: &[(&str, Value)]) -> GossipDigest {
        GossipDigest::new(
            peers,
            values
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn record_events(engine: &GossipEngine) -> (Arc<Mutex<Vec<ClusterEvent>>>, crate::Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sub = engine
            .events()
            .subscribe(move |event| seen_clone.lock().unwrap().push(event));
        (seen, sub)
    }

    // ===== Bootstrap =====

    #[tokio::test]
    async fn test_bootstrap_adopts_and_replies_with_push() {
        let mut h = Harness::new(GossipConfig::default());
        h.engine.store().insert("k1", value(10, "old"));

        h.deliver("joiner", Payload::Bootstrap(record("joiner", 9000)));

        let joiner: PeerId = "joiner".parse().unwrap();
        assert!(h.engine.directory().contains(&joiner));

        let sent = h.drain().await;
        assert_eq!(sent.len(), 1);
        let (target, message) = &sent[0];
        assert_eq!(*target, PeerAddress::new("127.0.0.1", 9000));
        assert_eq!(message.kind().unwrap(), MessageKind::Push);
        assert_eq!(message.sender().as_str(), "local");

        let Payload::Push(digest) = message.payload().unwrap() else {
            panic!("expected push");
        };
        assert_eq!(digest.peers.len(), 2);
        assert_eq!(digest.values["k1"], value(10, "old"));
    }

    #[tokio::test]
    async fn test_bootstrap_fans_out_to_existing_peers() {
        let mut h = Harness::with_peers(7);

        h.deliver("joiner", Payload::Bootstrap(record("joiner", 9000)));

        let sent = h.drain().await;
        assert_eq!(sent.len(), 6);

        let to_joiner = sent
            .iter()
            .filter(|(target, _)| target.port == 9000)
            .count();
        assert_eq!(to_joiner, 1);

        let fanned: HashSet<u16> = sent
            .iter()
            .filter(|(target, _)| target.port != 9000)
            .map(|(target, _)| target.port)
            .collect();
        assert_eq!(fanned.len(), 5);
        assert!(!fanned.contains(&7000));
        assert!(sent.iter().all(|(_, m)| m.kind().unwrap() == MessageKind::Push));
    }

    #[tokio::test]
    async fn test_bootstrap_sender_mismatch_is_dropped() {
        let mut h = Harness::new(GossipConfig::default());
        let (events, _sub) = record_events(&h.engine);

        h.deliver("mallory", Payload::Bootstrap(record("victim", 9000)));

        assert_eq!(h.engine.directory().len(), 1);
        assert!(h.drain().await.is_empty());
        assert!(matches!(
            events.lock().unwrap().as_slice(),
            [ClusterEvent::MessageDropped { .. }]
        ));
    }

    #[tokio::test]
    async fn test_bootstrap_reply_uses_known_address() {
        let mut h = Harness::with_peers(1);

        h.deliver("p0", Payload::Bootstrap(record("p0", 9999)));

        let sent = h.drain().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, PeerAddress::new("127.0.0.1", 8000));
        assert_eq!(
            h.engine.directory().get(&"p0".parse().unwrap()).unwrap().address.port,
            8000
        );
    }

    // ===== Push =====

    #[tokio::test]
    async fn test_push_with_new_peer_fans_out_within_bound() {
        let mut h = Harness::with_peers(8);
        let digest = digest_of(vec![record("p0", 8000), record("fresh", 9500)], &[]);

        h.deliver("p0", Payload::Push(digest));

        let sent = h.drain().await;
        assert!(!sent.is_empty());
        assert!(sent.len() <= 5);

        let targets: HashSet<u16> = sent.iter().map(|(t, _)| t.port).collect();
        assert_eq!(targets.len(), sent.len());
        assert!(!targets.contains(&7000), "never sends to itself");
        assert!(!targets.contains(&8000), "never sends back to the sender");

        for (_, message) in &sent {
            let Payload::Push(forwarded) = message.payload().unwrap() else {
                panic!("expected push");
            };
            // Fresh digest includes the newly learned peer and ourselves
            assert_eq!(forwarded.peers.len(), 10);
        }
    }

    #[tokio::test]
    async fn test_push_without_new_peer_is_not_forwarded() {
        let mut h = Harness::with_peers(3);
        let digest = digest_of(vec![record("p0", 8000)], &[("k1", value(5, "v"))]);

        h.deliver("p0", Payload::Push(digest));

        assert_eq!(h.engine.store().get("k1"), Some(value(5, "v")));
        assert!(h.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_push_merges_values_and_emits_events() {
        let mut h = Harness::with_peers(1);
        h.engine.store().insert("k1", value(10, "mine"));
        let (events, _sub) = record_events(&h.engine);

        let digest = digest_of(
            vec![],
            &[("k1", value(20, "newer")), ("k2", value(1, "other"))],
        );
        h.deliver("p0", Payload::Push(digest));

        assert_eq!(h.engine.store().get("k1"), Some(value(20, "newer")));
        assert_eq!(h.engine.store().get("k2"), Some(value(1, "other")));
        assert_eq!(
            *events.lock().unwrap(),
            vec![ClusterEvent::ValuesMerged {
                keys: vec!["k1".to_string(), "k2".to_string()]
            }]
        );
        assert!(h.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_push_does_not_regress_values() {
        let h = Harness::with_peers(1);
        h.engine.store().insert("k1", value(10, "mine"));

        h.deliver("p0", Payload::Push(digest_of(vec![], &[("k1", value(3, "old"))])));

        assert_eq!(h.engine.store().get("k1"), Some(value(10, "mine")));
    }

    // ===== Pull =====

    #[tokio::test]
    async fn test_pull_request_gets_direct_response() {
        let mut h = Harness::with_peers(4);
        h.engine.store().insert("k1", value(10, "old"));

        let digest = digest_of(vec![record("p2", 8002)], &[("k9", value(1, "theirs"))]);
        h.deliver("p2", Payload::PullRequest(digest));

        assert!(h.engine.store().get("k9").is_some());

        let sent = h.drain().await;
        assert_eq!(sent.len(), 1);
        let (target, message) = &sent[0];
        assert_eq!(target.port, 8002);
        let Payload::PullResponse(reply) = message.payload().unwrap() else {
            panic!("expected pull response");
        };
        assert!(reply.values.contains_key("k1"));
        assert!(reply.values.contains_key("k9"));
    }

    #[tokio::test]
    async fn test_pull_request_from_unknown_sender_is_dropped() {
        let mut h = Harness::new(GossipConfig::default());

        h.deliver("stranger", Payload::PullRequest(GossipDigest::default()));

        assert!(h.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_pull_response_is_terminal() {
        let mut h = Harness::with_peers(7);
        let digest = digest_of(vec![record("fresh", 9500)], &[("k1", value(1, "v"))]);

        h.deliver("p0", Payload::PullResponse(digest));

        assert!(h.engine.directory().contains(&"fresh".parse().unwrap()));
        assert!(h.engine.store().get("k1").is_some());
        assert!(h.drain().await.is_empty());
    }

    // ===== Tick =====

    #[tokio::test]
    async fn test_tick_on_singleton_sends_nothing() {
        let mut h = Harness::new(GossipConfig::default());
        h.engine.tick();
        assert!(h.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_tick_sends_one_pull_request() {
        let mut h = Harness::with_peers(6);
        h.engine.tick();

        let sent = h.drain().await;
        assert_eq!(sent.len(), 1);
        let (target, message) = &sent[0];
        assert_ne!(target.port, 7000);
        assert_eq!(message.kind().unwrap(), MessageKind::PullRequest);
    }

    #[tokio::test]
    async fn test_tick_evicts_stale_peers() {
        let config = GossipConfig {
            stale_threshold: Duration::from_millis(20),
            ..GossipConfig::default()
        };
        let h = Harness::new(config);
        h.engine.directory().upsert(record("gone", 8000));
        let (events, _sub) = record_events(&h.engine);

        tokio::time::sleep(Duration::from_millis(60)).await;
        h.engine.tick();

        assert_eq!(h.engine.directory().len(), 1);
        assert_eq!(
            *events.lock().unwrap(),
            vec![ClusterEvent::PeerEvicted {
                peer_id: "gone".parse().unwrap()
            }]
        );
    }

    #[tokio::test]
    async fn test_digest_does_not_revive_evicted_peer() {
        let config = GossipConfig {
            stale_threshold: Duration::from_millis(300),
            ..GossipConfig::default()
        };
        let mut h = Harness::new(config);
        h.engine.directory().upsert(record("gone", 8000));
        tokio::time::sleep(Duration::from_millis(400)).await;
        h.engine.directory().upsert(record("alive", 8001));

        h.engine.tick();
        let gone: PeerId = "gone".parse().unwrap();
        assert!(!h.engine.directory().contains(&gone));

        let (events, _sub) = record_events(&h.engine);
        let lagging = digest_of(vec![record("alive", 8001), record("gone", 8000)], &[]);
        h.deliver("alive", Payload::Push(lagging.clone()));
        h.deliver("alive", Payload::PullResponse(lagging));

        assert!(!h.engine.directory().contains(&gone));
        assert_eq!(h.engine.directory().len(), 2);
        assert!(events.lock().unwrap().is_empty());

        // Only the tick's pull request; the push caused no fan-out
        let sent = h.drain().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.kind().unwrap(), MessageKind::PullRequest);
    }

    // ===== Liveness and rejection =====

    #[tokio::test]
    async fn test_malformed_body_still_refreshes_sender() {
        let h = Harness::with_peers(1);
        let (events, _sub) = record_events(&h.engine);
        let p0: PeerId = "p0".parse().unwrap();
        let before = h.engine.directory().last_seen(&p0).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let mut message =
            Message::new(p0.clone(), &Payload::Push(GossipDigest::default())).unwrap();
        message.body = vec![0xff];
        h.engine.handle_datagram(&h.channel.seal(message).unwrap());

        assert!(h.engine.directory().last_seen(&p0).unwrap() > before);
        assert!(matches!(
            events.lock().unwrap().as_slice(),
            [ClusterEvent::MessageDropped { .. }]
        ));
    }

    #[tokio::test]
    async fn test_handled_message_refreshes_sender() {
        let h = Harness::with_peers(1);
        let p0: PeerId = "p0".parse().unwrap();
        let before = h.engine.directory().last_seen(&p0).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        h.deliver("p0", Payload::Push(GossipDigest::default()));

        assert!(h.engine.directory().last_seen(&p0).unwrap() > before);
    }

    #[tokio::test]
    async fn test_foreign_cluster_datagram_is_dropped() {
        let mut h = Harness::new(GossipConfig::default());
        let (events, _sub) = record_events(&h.engine);

        let foreign = SecureChannel::new(foreign_keys().clone(), config_limit());
        let message = Message::new(
            "intruder".parse().unwrap(),
            &Payload::Bootstrap(record("intruder", 9000)),
        )
        .unwrap();
        h.engine.handle_datagram(&foreign.seal(message).unwrap());

        assert_eq!(h.engine.directory().len(), 1);
        assert!(h.drain().await.is_empty());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_garbage_datagram_is_dropped() {
        let h = Harness::new(GossipConfig::default());
        h.engine.handle_datagram(&[1, 2, 3]);
        h.engine.handle_datagram(&[]);
        assert_eq!(h.engine.directory().len(), 1);
    }
}
