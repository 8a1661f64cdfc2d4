//! Replicated key-value store.
//!
//! Values carry a nanosecond timestamp and a conflict mode. Incoming
//! snapshots are merged per key, gated on the whole-record timestamp:
//!
//! - `LatestWins`: a strictly newer incoming value replaces the local one.
//! - `MergeKeepNewer`: a strictly newer incoming value overwrites the local
//!   attributes it carries and bumps the local timestamp.
//!
//! The local record's mode decides which rule applies. Merging is idempotent,
//! and there are no tombstones: keys are never deleted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use web_time::{SystemTime, UNIX_EPOCH};

/// Conflict resolution policy for a replicated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictMode {
    /// Keep whichever whole value is newer
    LatestWins,
    /// Copy the newer value's attributes over the local ones
    MergeKeepNewer,
}

/// Opaque attribute payload. The core never interprets these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Bytes(Vec<u8>),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// A replicated value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    /// Nanoseconds since the Unix epoch of the last modification
    pub modified_at: u64,
    pub mode: ConflictMode,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Value {
    /// Create a value stamped with the current wall clock.
    pub fn new(mode: ConflictMode, attributes: BTreeMap<String, AttributeValue>) -> Self {
        Self::with_timestamp(now_nanos(), mode, attributes)
    }

    pub fn with_timestamp(
        modified_at: u64,
        mode: ConflictMode,
        attributes: BTreeMap<String, AttributeValue>,
    ) -> Self {
        Self {
            modified_at,
            mode,
            attributes,
        }
    }

    /// Fold `incoming` into `self` according to `self.mode`.
    ///
    /// Returns true if `self` changed.
    pub fn merge_from(&mut self, incoming: &Value) -> bool {
        if incoming.modified_at <= self.modified_at {
            return false;
        }
        match self.mode {
            ConflictMode::LatestWins => {
                *self = incoming.clone();
            }
            ConflictMode::MergeKeepNewer => {
                for (key, attribute) in &incoming.attributes {
                    self.attributes.insert(key.clone(), attribute.clone());
                }
                self.modified_at = incoming.modified_at;
            }
        }
        true
    }
}

/// Current wall clock in nanoseconds since the Unix epoch.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Thread-safe replicated store.
///
/// Wrap in `Arc` for shared ownership.
#[derive(Default)]
pub struct ReplicatedStore {
    values: RwLock<HashMap<String, Value>>,
}

impl ReplicatedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a value locally, replacing whatever was stored under `key`.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Merge an incoming snapshot.
    ///
    /// Returns the keys whose local value changed, in key order.
    pub fn merge(&self, incoming: &BTreeMap<String, Value>) -> Vec<String> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        let mut changed = Vec::new();

        for (key, value) in incoming {
            match values.get_mut(key) {
                None => {
                    values.insert(key.clone(), value.clone());
                    changed.push(key.clone());
                }
                Some(local) => {
                    if local.merge_from(value) {
                        changed.push(key.clone());
                    }
                }
            }
        }

        changed
    }

    /// Copy of every stored value, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
