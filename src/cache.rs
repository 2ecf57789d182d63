use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::{
    domain::{CacheMap, ListingId, Verdict},
    store::KeyValueStore,
};

/// Listing verdicts persisted under a single store key.
///
/// Loaded once, written back in full after each successful fetch. Entries are
/// superseded, never removed.
pub struct VerdictCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    ttl: TimeDelta,
    entries: CacheMap,
}

impl VerdictCache {
    /// Reads the persisted mapping. Never fails: an unreadable or undecodable
    /// value yields an empty cache.
    pub async fn load(store: Arc<dyn KeyValueStore>, key: impl Into<String>, ttl: TimeDelta) -> Self {
        let key = key.into();
        let entries = match store.get(&key, Value::Object(Default::default())).await {
            Ok(value) => match serde_json::from_value::<CacheMap>(value) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(target: "cache", key = %key, error = %err, "stored cache is malformed; starting empty");
                    CacheMap::new()
                }
            },
            Err(err) => {
                tracing::warn!(target: "cache", key = %key, error = %err, "cache load failed; starting empty");
                CacheMap::new()
            }
        };
        tracing::debug!(target: "cache", key = %key, entries = entries.len(), "cache loaded");
        Self {
            store,
            key,
            ttl,
            entries,
        }
    }

    pub fn is_fresh(&self, entry: Option<&Verdict>, now: DateTime<Utc>) -> bool {
        entry.is_some_and(|entry| now - entry.updated_at < self.ttl)
    }

    pub fn get(&self, id: ListingId) -> Option<&Verdict> {
        self.entries.get(&id)
    }

    pub fn fresh(&self, id: ListingId, now: DateTime<Utc>) -> Option<&Verdict> {
        self.get(id).filter(|entry| self.is_fresh(Some(entry), now))
    }

    pub fn insert(&mut self, id: ListingId, verdict: Verdict) {
        self.entries.insert(id, verdict);
    }

    /// Persists the whole mapping. Failures are logged and dropped; the next
    /// successful fetch writes again.
    pub async fn save(&self) {
        let value = match serde_json::to_value(&self.entries) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(target: "cache", error = %err, "cache serialization failed");
                return;
            }
        };
        if let Err(err) = self.store.set(&self.key, value).await {
            tracing::warn!(target: "cache", key = %self.key, error = %err, "cache save failed");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
