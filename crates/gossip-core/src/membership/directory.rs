//! Membership directory for tracking known peers.
//!
//! Each structure sits behind its own `RwLock`. Operations touching more
//! than one take the locks in a fixed order: `records` → `ids` → `last_seen`
//! → `evicted`. Callers never hold a directory lock while taking the store lock.
//!
//! Evicted ids are held back for one stale threshold, so a digest from a
//! peer that has not yet noticed the departure cannot re-adopt them.

use super::PeerRecord;
use crate::PeerId;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;
use web_time::Instant;

/// Default rejection-sampling draws per selected peer.
const DEFAULT_SAMPLE_ATTEMPTS: usize = 64;

/// Thread-safe directory of known peers, including the local node.
///
/// Wrap in `Arc` for shared ownership.
pub struct MembershipDirectory {
    local: PeerRecord,
    records: RwLock<HashMap<PeerId, PeerRecord>>,
    /// Insertion-ordered; each known id appears exactly once
    ids: RwLock<Vec<PeerId>>,
    last_seen: RwLock<HashMap<PeerId, Instant>>,
    /// Recently evicted ids and when they may be adopted again
    evicted: RwLock<HashMap<PeerId, Instant>>,
    sample_attempts_per_pick: usize,
}

impl MembershipDirectory {
    /// Create a directory containing only the local node.
    pub fn new(local: PeerRecord) -> Self {
        let local_id = local.id.clone();
        Self {
            records: RwLock::new(HashMap::from([(local_id.clone(), local.clone())])),
            ids: RwLock::new(vec![local_id.clone()]),
            last_seen: RwLock::new(HashMap::from([(local_id, Instant::now())])),
            evicted: RwLock::new(HashMap::new()),
            local,
            sample_attempts_per_pick: DEFAULT_SAMPLE_ATTEMPTS,
        }
    }

    /// Set how many random draws a single pick may reject before giving up.
    pub fn with_sample_attempts(mut self, attempts: usize) -> Self {
        self.sample_attempts_per_pick = attempts.max(1);
        self
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local.id
    }

    pub fn local_record(&self) -> &PeerRecord {
        &self.local
    }

    /// Adopt a peer if its id is unknown.
    ///
    /// Known ids are never re-addressed. Returns true if the peer was new.
    pub fn upsert(&self, record: PeerRecord) -> bool {
        !self.upsert_all(std::iter::once(record)).is_empty()
    }

    /// Adopt every unknown peer in one critical section.
    ///
    /// Ids evicted less than one stale threshold ago are skipped. Returns the
    /// newly adopted records.
    pub fn upsert_all(&self, incoming: impl IntoIterator<Item = PeerRecord>) -> Vec<PeerRecord> {
        self.upsert_all_at(Instant::now(), incoming)
    }

    pub fn upsert_all_at(
        &self,
        now: Instant,
        incoming: impl IntoIterator<Item = PeerRecord>,
    ) -> Vec<PeerRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let mut ids = self.ids.write().unwrap_or_else(|e| e.into_inner());
        let mut last_seen = self.last_seen.write().unwrap_or_else(|e| e.into_inner());
        let evicted = self.evicted.read().unwrap_or_else(|e| e.into_inner());

        let mut adopted = Vec::new();

        for record in incoming {
            if records.contains_key(&record.id) {
                continue;
            }
            if evicted.get(&record.id).is_some_and(|until| now < *until) {
                continue;
            }
            ids.push(record.id.clone());
            last_seen.insert(record.id.clone(), now);
            records.insert(record.id.clone(), record.clone());
            adopted.push(record);
        }

        adopted
    }

    pub fn get(&self, id: &PeerId) -> Option<PeerRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    /// All known records (including ourselves), ordered by id.
    pub fn records(&self) -> Vec<PeerRecord> {
        let mut records: Vec<_> = self
            .records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Known ids in insertion order.
    pub fn ids(&self) -> Vec<PeerId> {
        self.ids.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of known peers, including ourselves.
    pub fn len(&self) -> usize {
        self.ids.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Always false: the local node is never removed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw up to `max` distinct ids uniformly at random.
    ///
    /// Never returns the local id or anything in `excluding`. Uses rejection
    /// sampling over the id list with a bounded number of draws per pick;
    /// running out of draws ends the sample early.
    pub fn sample_random(&self, excluding: &HashSet<PeerId>, max: usize) -> Vec<PeerId> {
        let ids = self.ids();
        let local_id = self.local_id();

        let eligible = ids
            .iter()
            .filter(|id| *id != local_id && !excluding.contains(*id))
            .count();
        let wanted = max.min(eligible);

        // Scale with the pool so large pools with few eligible ids still find them
        let attempts = self.sample_attempts_per_pick.max(4 * ids.len());

        let mut rng = rand::rng();
        let mut taken: HashSet<usize> = HashSet::with_capacity(wanted);
        let mut sample = Vec::with_capacity(wanted);

        while sample.len() < wanted {
            let pick = (0..attempts).find_map(|_| {
                let index = rng.random_range(0..ids.len());
                let id = &ids[index];
                let rejected = id == local_id || excluding.contains(id) || taken.contains(&index);
                (!rejected).then_some(index)
            });

            match pick {
                Some(index) => {
                    taken.insert(index);
                    sample.push(ids[index].clone());
                }
                None => break,
            }
        }

        sample
    }

    /// Record that `id` was heard from just now.
    ///
    /// Returns false (and records nothing) for unknown ids.
    pub fn touch(&self, id: &PeerId) -> bool {
        self.touch_at(id, Instant::now())
    }

    pub fn touch_at(&self, id: &PeerId, at: Instant) -> bool {
        let mut last_seen = self.last_seen.write().unwrap_or_else(|e| e.into_inner());
        match last_seen.get_mut(id) {
            Some(seen) => {
                *seen = at;
                true
            }
            None => false,
        }
    }

    pub fn last_seen(&self, id: &PeerId) -> Option<Instant> {
        self.last_seen
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .copied()
    }

    /// Remove every peer not heard from for longer than `threshold`.
    ///
    /// Evicted ids cannot be re-adopted until `threshold` has passed again.
    /// Returns the evicted ids.
    pub fn evict_stale(&self, threshold: Duration) -> Vec<PeerId> {
        self.evict_stale_at(Instant::now(), threshold)
    }

    pub fn evict_stale_at(&self, now: Instant, threshold: Duration) -> Vec<PeerId> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let mut ids = self.ids.write().unwrap_or_else(|e| e.into_inner());
        let mut last_seen = self.last_seen.write().unwrap_or_else(|e| e.into_inner());
        let mut evicted = self.evicted.write().unwrap_or_else(|e| e.into_inner());

        evicted.retain(|_, until| now < *until);

        let local_id = self.local_id();
        let stale: HashSet<PeerId> = last_seen
            .iter()
            .filter(|(id, seen)| {
                *id != local_id && now.saturating_duration_since(**seen) > threshold
            })
            .map(|(id, _)| id.clone())
            .collect();

        if stale.is_empty() {
            return Vec::new();
        }

        let held_until = now.checked_add(threshold).unwrap_or(now);
        for id in &stale {
            last_seen.remove(id);
            records.remove(id);
            evicted.insert(id.clone(), held_until);
        }
        ids.retain(|id| !stale.contains(id));

        let mut removed: Vec<_> = stale.into_iter().collect();
        removed.sort();
        removed
    }
}
