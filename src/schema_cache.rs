//! TTL cache for rendered schema prompts with per-key request coalescing.
//!
//! The schema prompt is hot and expensive to build (one table listing plus a
//! schema fetch per table). Concurrent misses for the same dataset share a
//! single fetch: callers serialize on a per-key flight lock and re-check the
//! cache after acquiring it, so at most one backend listing is in flight per
//! dataset at any time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

/// Default entry lifetime.
pub const SCHEMA_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    prompt: String,
    expires_at: Instant,
}

/// Prompt cache keyed by dataset id. Entries are immutable after insertion;
/// invalidation is by key deletion. Reads are concurrent, writes exclusive.
pub struct SchemaPromptCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SchemaPromptCache {
    pub fn new() -> Self {
        Self::with_ttl(SCHEMA_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Non-expired cached prompt, if any. An expired entry is a miss.
    pub async fn get(&self, dataset_id: &str) -> Option<String> {
        let entries = self.entries.read().await;
        let entry = entries.get(dataset_id)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.prompt.clone())
    }

    /// Inserts with the configured TTL, replacing any previous entry.
    pub async fn insert(&self, dataset_id: &str, prompt: String) {
        let mut entries = self.entries.write().await;
        entries.insert(
            dataset_id.to_string(),
            CacheEntry {
                prompt,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub async fn invalidate(&self, dataset_id: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(dataset_id);
    }

    /// The per-key coalescing lock. Holding the guard makes the caller the
    /// flight winner for this dataset; losers queue behind it and re-check
    /// the cache once they acquire the lock.
    pub async fn flight_lock(&self, dataset_id: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        flights
            .entry(dataset_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the flight slot once the winner has populated the cache.
    /// Callers already holding a clone of the lock keep working; the next
    /// cold miss creates a fresh slot.
    pub async fn release_flight(&self, dataset_id: &str) {
        let mut flights = self.flights.lock().await;
        flights.remove(dataset_id);
    }
}

impl Default for SchemaPromptCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = SchemaPromptCache::with_ttl(Duration::from_millis(10));
        cache.insert("ds", "prompt".to_string()).await;
        assert_eq!(cache.get("ds").await.as_deref(), Some("prompt"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("ds").await, None);
    }

    #[tokio::test]
    async fn insert_replaces_previous_entry() {
        let cache = SchemaPromptCache::new();
        cache.insert("ds", "one".to_string()).await;
        cache.insert("ds", "two".to_string()).await;
        assert_eq!(cache.get("ds").await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = SchemaPromptCache::new();
        cache.insert("ds", "one".to_string()).await;
        cache.invalidate("ds").await;
        assert_eq!(cache.get("ds").await, None);
    }

    #[tokio::test]
    async fn flight_lock_is_shared_per_key() {
        let cache = SchemaPromptCache::new();
        let a = cache.flight_lock("ds").await;
        let b = cache.flight_lock("ds").await;
        assert!(Arc::ptr_eq(&a, &b));

        let other = cache.flight_lock("other").await;
        assert!(!Arc::ptr_eq(&a, &other));
    }
}
