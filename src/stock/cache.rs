use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::storage::{KeyValueStore, MemoryStore};

/// Time-to-live cache over a text key-value store.
///
/// The payload is stored as JSON under `key` and its fetch time (Unix millis)
/// under `key_timestamp`. Entries are only ever overwritten, never removed.
#[derive(Clone)]
pub struct CacheStore {
    name: &'static str,
    backend: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl CacheStore {
    pub fn new(name: &'static str, backend: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { name, backend, ttl }
    }

    /// In-memory tier scoped to the process lifetime
    pub fn transient(ttl: Duration) -> Self {
        Self::new("request", Arc::new(MemoryStore::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn timestamp_key(key: &str) -> String {
        format!("{key}_timestamp")
    }

    /// Payload stored under `key`, whatever its age
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("{} cache read failed for {key}: {e}", self.name);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("{} cache entry {key} is unreadable, treating as miss: {e}", self.name);
                None
            }
        }
    }

    /// When the entry under `key` was fetched
    pub async fn fetched_at(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.backend.get(&Self::timestamp_key(key)).await.ok()??;
        let millis = raw.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    /// True when an entry exists and `now - fetched_at < ttl`
    pub async fn is_valid(&self, key: &str) -> bool {
        self.is_valid_at(key, Utc::now()).await
    }

    pub async fn is_valid_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        match self.fetched_at(key).await {
            Some(fetched_at) => now.signed_duration_since(fetched_at) < self.ttl,
            None => false,
        }
    }

    /// Payload under `key` if it is still within its TTL
    pub async fn get_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.is_valid(key).await {
            return None;
        }
        let payload = self.get(key).await;
        if payload.is_some() {
            debug!("{} cache hit: {key}", self.name);
        }
        payload
    }

    /// Store `payload` as fetched now
    pub async fn put<T: Serialize>(&self, key: &str, payload: &T) {
        self.put_at(key, payload, Utc::now()).await
    }

    /// Store `payload` with an explicit fetch time. Write failures are logged and dropped.
    pub async fn put_at<T: Serialize>(&self, key: &str, payload: &T, fetched_at: DateTime<Utc>) {
        let raw = match serde_json::to_string(payload) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{} cache could not serialize {key}: {e}", self.name);
                return;
            }
        };

        // Payload before timestamp: a lost timestamp write can only make the entry look older
        if let Err(e) = self.backend.set(key, &raw).await {
            warn!("{} cache write failed for {key}: {e}", self.name);
            return;
        }
        if let Err(e) = self
            .backend
            .set(&Self::timestamp_key(key), &fetched_at.timestamp_millis().to_string())
            .await
        {
            warn!("{} cache timestamp write failed for {key}: {e}", self.name);
        }
    }
}
