//! Fingerprint-keyed result memo with lazy TTL expiry.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use sha2::{Digest, Sha256};

use insight_core::DataSample;

use crate::clock::Clock;

/// How much of the serialized data takes part in a fingerprint.
pub const FINGERPRINT_DATA_CHARS: usize = 4096;

/// SHA-256 hex over the request text and a bounded prefix of the data.
///
/// Two payloads sharing their first [`FINGERPRINT_DATA_CHARS`] serialized
/// characters collide; that is accepted.
pub fn fingerprint(request: &str, data: &DataSample) -> String {
    let serialized = serde_json::to_string(data).unwrap_or_default();
    let prefix: String = serialized.chars().take(FINGERPRINT_DATA_CHARS).collect();

    let mut hasher = Sha256::new();
    hasher.update(request.as_bytes());
    hasher.update([0u8]);
    hasher.update(prefix.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: DateTime<Utc>,
}

/// Bounded LRU of results. An expired entry reads as a miss and stays put
/// until it is overwritten or evicted.
pub struct ResultCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| {
                // A clock that moved backwards reads as zero elapsed.
                let age = now
                    .signed_duration_since(entry.created_at)
                    .to_std()
                    .unwrap_or_default();
                age <= self.ttl
            })
            .map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: String, value: V) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .put(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn sample(value: serde_json::Value) -> DataSample {
        serde_json::from_value(value).unwrap()
    }

    fn cache(clock: Arc<ManualClock>, capacity: usize) -> ResultCache<String> {
        ResultCache::new(capacity, Duration::from_secs(600), clock)
    }

    #[test]
    fn hit_within_ttl_miss_after() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(clock.clone(), 8);
        cache.put("k".into(), "v".into());

        clock.advance(Duration::from_secs(600));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k"), None);
        // Lazy expiry leaves the entry in place.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_overwrites_and_refreshes() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(clock.clone(), 8);
        cache.put("k".into(), "old".into());
        clock.advance(Duration::from_secs(700));
        cache.put("k".into(), "new".into());
        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn evicts_least_recently_used() {
        let clock = Arc::new(ManualClock::default());
        let cache = cache(clock, 2);
        cache.put("a".into(), "1".into());
        cache.put("b".into(), "2".into());
        assert!(cache.get("a").is_some());
        cache.put("c".into(), "3".into());
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_and_gets_are_consistent() {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(cache(clock, 64));
        assert!(cache.is_empty());

        let mut handles = Vec::new();
        for task in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let key = format!("k{}", (task * 50 + i) % 32);
                    cache.put(key.clone(), format!("task{task}"));
                    let seen = cache.get(&key);
                    assert!(seen.is_some_and(|v| v.starts_with("task")));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }

        assert_eq!(cache.len(), 32);
        for i in 0..32 {
            assert!(cache.get(&format!("k{i}")).is_some());
        }
    }

    #[test]
    fn fingerprint_depends_on_request_and_data() {
        let data = sample(json!([{"region": "A", "cases": 10}]));
        let other = sample(json!([{"region": "B", "cases": 10}]));

        let fp = fingerprint("summarize", &data);
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, fingerprint("summarize", &data));
        assert_ne!(fp, fingerprint("auto_visualize", &data));
        assert_ne!(fp, fingerprint("summarize", &other));
    }

    #[test]
    fn fingerprint_ignores_data_past_prefix() {
        let filler = "x".repeat(FINGERPRINT_DATA_CHARS);
        let a = sample(json!([{"note": filler, "tail": 1}]));
        let b = sample(json!([{"note": filler, "tail": 2}]));
        assert_eq!(fingerprint("q", &a), fingerprint("q", &b));
    }
}
