//! Metadata LRU cache (§4.9): bounded by `max_entries` with a `ttl_seconds`
//! expiry, keyed by `bucket/key[/version_id]`. Entries are bucketed by
//! xxHash into a chained table; a separate recency list (MRU at the back)
//! drives eviction. One `parking_lot::RwLock` guards both structures, per
//! §5's "each long-lived structure owns exactly one lock".

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use strata_common::xxhash64;

use crate::xlmeta::XlMeta;

const DEFAULT_MAX_ENTRIES: usize = 10_000;
const DEFAULT_TTL_SECONDS: u64 = 300;
const NUM_BUCKETS: usize = 256;

/// `bucket/key` or `bucket/key/version_id`, matching §4.9's key shape.
#[must_use]
pub fn cache_key(bucket: &str, key: &str, version_id: Option<&str>) -> String {
    match version_id {
        Some(v) => format!("{bucket}/{key}/{v}"),
        None => format!("{bucket}/{key}"),
    }
}

fn bucket_of(key: &str) -> usize {
    (xxhash64(key.as_bytes()) as usize) % NUM_BUCKETS
}

struct Entry {
    meta: XlMeta,
    inserted_at: Instant,
}

impl Entry {
    fn is_stale(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

#[derive(Default)]
struct Inner {
    buckets: Vec<Vec<(String, Entry)>>,
    /// Recency order, LRU at the front, MRU at the back. A key may appear
    /// more than once until its next eviction scan compacts it; lookups
    /// always resolve through `buckets`, so duplicate entries are harmless.
    recency: Vec<String>,
    count: usize,
}

/// Cache-wide hit/miss/eviction counters (§2.1 "Metrics"), exposed as plain
/// atomics so an exporter can read them without taking the cache's lock.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    #[must_use]
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct MetadataCache {
    max_entries: usize,
    ttl: Duration,
    inner: RwLock<Inner>,
    stats: CacheStats,
}

impl MetadataCache {
    #[must_use]
    pub fn new(max_entries: usize, ttl_seconds: u64) -> Self {
        Self {
            max_entries,
            ttl: Duration::from_secs(ttl_seconds),
            inner: RwLock::new(Inner {
                buckets: (0..NUM_BUCKETS).map(|_| Vec::new()).collect(),
                recency: Vec::new(),
                count: 0,
            }),
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.read().count
    }

    /// `get`: shared lock to search, exclusive upgrade only to touch
    /// recency (§4.9). A stale hit is treated as a miss and evicted.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<XlMeta> {
        let found = {
            let guard = self.inner.read();
            let idx = bucket_of(key);
            guard.buckets[idx]
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, entry)| (entry.is_stale(self.ttl), entry.meta.deep_clone()))
        };

        match found {
            Some((true, _)) => {
                self.invalidate(key);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some((false, meta)) => {
                self.touch(key);
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(meta)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn touch(&self, key: &str) {
        let mut guard = self.inner.write();
        guard.recency.push(key.to_string());
    }

    /// `put`: exclusive lock; deep-clones `meta` into the cache's own copy
    /// (§3 "the metadata cache exclusively owns every cached `xl.meta`").
    /// Evicts the LRU tail when full.
    pub fn put(&self, key: &str, meta: &XlMeta) {
        let mut guard = self.inner.write();
        let idx = bucket_of(key);

        if let Some(slot) = guard.buckets[idx].iter_mut().find(|(k, _)| k == key) {
            slot.1 = Entry {
                meta: meta.deep_clone(),
                inserted_at: Instant::now(),
            };
            guard.recency.push(key.to_string());
            return;
        }

        while guard.count >= self.max_entries {
            if !Self::evict_one(&mut guard) {
                break;
            }
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }

        guard.buckets[idx].push((
            key.to_string(),
            Entry {
                meta: meta.deep_clone(),
                inserted_at: Instant::now(),
            },
        ));
        guard.recency.push(key.to_string());
        guard.count += 1;
    }

    /// `invalidate`: exclusive lock, removes the entry if present. The
    /// writer is responsible for calling this on any mutation (§4.9
    /// contract: a cached entry is authoritative until invalidated).
    pub fn invalidate(&self, key: &str) {
        let mut guard = self.inner.write();
        let idx = bucket_of(key);
        let before = guard.buckets[idx].len();
        guard.buckets[idx].retain(|(k, _)| k != key);
        if guard.buckets[idx].len() < before {
            guard.count -= 1;
        }
        guard.recency.retain(|k| k != key);
    }

    /// Evict the least-recently-touched live entry. Compacts stale
    /// recency-list duplicates as it scans. Returns `false` if nothing
    /// could be evicted (cache genuinely empty).
    fn evict_one(guard: &mut Inner) -> bool {
        while let Some(candidate) = guard.recency.first().cloned() {
            guard.recency.remove(0);
            // Skip if this was a stale duplicate from an earlier `touch`;
            // only the last occurrence in `recency` for a live key matters.
            if guard.recency.contains(&candidate) {
                continue;
            }
            let idx = bucket_of(&candidate);
            let before = guard.buckets[idx].len();
            guard.buckets[idx].retain(|(k, _)| k != &candidate);
            if guard.buckets[idx].len() < before {
                guard.count -= 1;
                return true;
            }
        }
        false
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlmeta::{ErasureMeta, ObjectMeta, Stat, Versioning, XL_META_FORMAT, XL_META_VERSION};

    fn sample(size: u64) -> XlMeta {
        XlMeta {
            version: XL_META_VERSION,
            format: XL_META_FORMAT.to_string(),
            bucket: "b".to_string(),
            key: "k".to_string(),
            stat: Stat {
                size,
                mod_time: "2026-07-27T00:00:00Z".to_string(),
            },
            erasure: ErasureMeta {
                algorithm: "ReedSolomon".to_string(),
                data: 2,
                parity: 1,
                block_size: 65536,
                index: 1,
                distribution: vec![1, 2, 3],
                checksums: vec![],
            },
            meta: ObjectMeta::default(),
            versioning: Versioning::default(),
            inline_data: None,
        }
    }

    #[test]
    fn test_put_then_get_hit() {
        let cache = MetadataCache::new(10, 300);
        cache.put("b/k", &sample(5));
        let got = cache.get("b/k").unwrap();
        assert_eq!(got.stat.size, 5);
        assert_eq!(cache.stats().snapshot().hits, 1);
    }

    #[test]
    fn test_get_miss_on_absent_key() {
        let cache = MetadataCache::new(10, 300);
        assert!(cache.get("missing").is_none());
        assert_eq!(cache.stats().snapshot().misses, 1);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = MetadataCache::new(10, 300);
        cache.put("b/k", &sample(1));
        cache.invalidate("b/k");
        assert!(cache.get("b/k").is_none());
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn test_eviction_at_capacity() {
        let cache = MetadataCache::new(2, 300);
        cache.put("a", &sample(1));
        cache.put("b", &sample(2));
        cache.put("c", &sample(3));
        assert_eq!(cache.count(), 2);
        assert_eq!(cache.stats().snapshot().evictions, 1);
        // "a" was least recently touched, so it should be gone.
        assert!(cache.get("a").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_touch_on_get_protects_from_eviction() {
        let cache = MetadataCache::new(2, 300);
        cache.put("a", &sample(1));
        cache.put("b", &sample(2));
        // Touch "a" so "b" becomes the LRU tail instead.
        assert!(cache.get("a").is_some());
        cache.put("c", &sample(3));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_stale_entry_treated_as_miss() {
        let cache = MetadataCache::new(10, 0);
        cache.put("b/k", &sample(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("b/k").is_none());
    }

    #[test]
    fn test_cache_key_with_and_without_version() {
        assert_eq!(cache_key("b", "k", None), "b/k");
        assert_eq!(cache_key("b", "k", Some("v1")), "b/k/v1");
    }
}
