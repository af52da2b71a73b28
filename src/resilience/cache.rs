//! Read-through response cache for outbound GETs.
//!
//! Entries are keyed by the exact request URL. Writes occasionally trigger a
//! sweep that drops expired entries and then evicts in insertion order until
//! the map is back within its size limit. Eviction ignores access recency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;

use crate::config::CacheConfig;
use crate::observability::metrics;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    inserted_at: Instant,
    sequence: u64,
}

/// Thread-safe URL → payload cache.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    enabled: bool,
    ttl: Duration,
    max_entries: usize,
    sweep_probability: f64,
    sequence: AtomicU64,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            enabled: config.enabled,
            ttl: Duration::from_millis(config.ttl_ms),
            max_entries: config.max_entries,
            sweep_probability: config.sweep_probability.clamp(0.0, 1.0),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached payload for `url` if younger than the TTL.
    pub fn get(&self, url: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }

        let hit = self
            .entries
            .get(url)
            .map(|entry| (entry.payload.clone(), entry.inserted_at.elapsed()));

        match hit {
            Some((payload, age)) if age < self.ttl => {
                tracing::debug!(url = %url, age_ms = age.as_millis() as u64, "Cache hit");
                metrics::record_cache_event("hit");
                Some(payload)
            }
            Some(_) => {
                self.entries
                    .remove_if(url, |_, entry| entry.inserted_at.elapsed() >= self.ttl);
                metrics::record_cache_event("miss");
                None
            }
            None => {
                metrics::record_cache_event("miss");
                None
            }
        }
    }

    /// Store a payload; may trigger a sweep.
    pub fn insert(&self, url: &str, payload: Value) {
        if !self.enabled {
            return;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                payload,
                inserted_at: Instant::now(),
                sequence,
            },
        );

        if rand::thread_rng().gen_bool(self.sweep_probability) {
            self.sweep();
        }
    }

    /// Remove expired entries, then evict oldest insertions beyond the limit.
    pub fn sweep(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

        let len = self.entries.len();
        if len <= self.max_entries {
            return;
        }

        let mut by_age: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.value().sequence, entry.key().clone()))
            .collect();
        by_age.sort_unstable_by_key(|(sequence, _)| *sequence);

        let excess = len - self.max_entries;
        for (_, key) in by_age.into_iter().take(excess) {
            self.entries.remove(&key);
            metrics::record_cache_event("eviction");
        }
        tracing::debug!(evicted = excess, remaining = self.entries.len(), "Cache swept");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(ttl_ms: u64, max_entries: usize, sweep_probability: f64) -> CacheConfig {
        CacheConfig {
            enabled: true,
            ttl_ms,
            max_entries,
            sweep_probability,
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = ResponseCache::new(&config(60_000, 10, 0.0));
        assert!(cache.get("http://x/tx/1").is_none());

        cache.insert("http://x/tx/1", json!({"txid": "1"}));
        assert_eq!(cache.get("http://x/tx/1"), Some(json!({"txid": "1"})));
        assert!(cache.get("http://x/tx/2").is_none());
    }

    #[test]
    fn test_expired_entry_removed() {
        let cache = ResponseCache::new(&config(20, 10, 0.0));
        cache.insert("a", json!(1));
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_evicts_in_insertion_order() {
        let cache = ResponseCache::new(&config(60_000, 2, 0.0));
        cache.insert("first", json!(1));
        cache.insert("second", json!(2));
        cache.insert("third", json!(3));

        // Reading does not refresh an entry's position.
        assert!(cache.get("first").is_some());

        cache.sweep();
        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn test_sweep_on_every_write() {
        let cache = ResponseCache::new(&config(60_000, 3, 1.0));
        for i in 0..10 {
            cache.insert(&format!("url-{}", i), json!(i));
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get("url-9").is_some());
    }

    #[test]
    fn test_disabled_cache() {
        let mut cfg = config(60_000, 10, 0.0);
        cfg.enabled = false;
        let cache = ResponseCache::new(&cfg);
        cache.insert("a", json!(1));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }
}
