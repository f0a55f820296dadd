use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Share of `max_entries` kept after an eviction sweep.
const EVICTION_TARGET: f64 = 0.9;

struct CacheEntry<T> {
    value: T,
    inserted_at: Instant,
}


#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Best-effort memoization of query results. Expired entries are dropped when read;
/// exceeding `max_entries` evicts the oldest entries in one sweep.
pub struct ResultCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    max_entries: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// SHA-256 over the query and a serialized view of the options.
    pub fn make_key(query: &str, options: &impl Serialize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(query.trim().as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_vec(options).unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: String, value: T) {
        let mut entries = self.entries.lock();
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );

        if entries.len() > self.max_entries {
            let target = ((self.max_entries as f64) * EVICTION_TARGET).floor() as usize;
            let excess = entries.len() - target;
            let mut by_age: Vec<(Instant, String)> = entries
                .iter()
                .map(|(k, e)| (e.inserted_at, k.clone()))
                .collect();
            by_age.sort();
            for (_, key) in by_age.into_iter().take(excess) {
                entries.remove(&key);
            }
            debug!("Result cache evicted {} entries", excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_lazy_expiry() {
        let cache = ResultCache::new(10, Duration::from_millis(0));
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_bulk_eviction_drops_oldest() {
        let cache = ResultCache::new(10, Duration::from_secs(60));
        for i in 0..10 {
            cache.insert(format!("k{i}"), i);
            std::thread::sleep(Duration::from_millis(1));
        }
        cache.insert("k10".to_string(), 10);

        assert_eq!(cache.len(), 9);
        assert_eq!(cache.get("k0"), None);
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k10"), Some(10));
        assert_eq!(cache.get("k9"), Some(9));
    }

    #[test]
    fn test_key_depends_on_options() {
        #[derive(Serialize)]
        struct Opts {
            limit: usize,
        }
        let a = ResultCache::<u8>::make_key("ml", &Opts { limit: 5 });
        let b = ResultCache::<u8>::make_key("ml", &Opts { limit: 6 });
        let c = ResultCache::<u8>::make_key(" ml ", &Opts { limit: 5 });
        assert_ne!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 64);
    }
}
