//! Request memoization for the permission engine.
//!
//! The cache is an explicit key→value store handed to the code that
//! needs memoization, never a hidden module-global. Entries carry tags
//! for fine-grained invalidation (per subject, per namespace) and a TTL;
//! there is no other invalidation beyond overwrite on the next
//! successful fetch.

use crate::metrics::EngineMetrics;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;

/// Cache tag for organizing cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Entries computed for a specific subject.
    Subject(String),
    /// Entries involving a specific namespace.
    Namespace(String),
    /// Entries produced by access-review probes.
    AccessReview,
}

/// Cache entry with metadata for invalidation.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    tags: HashSet<CacheTag>,
    created_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() - self.created_at >= ttl
    }
}

/// TTL'd key→value cache with tag-based invalidation.
#[derive(Debug)]
pub struct RequestCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    tag_index: DashMap<CacheTag, HashSet<String>>,
    ttl: Duration,
    metrics: EngineMetrics,
}

impl<V: Clone> RequestCache<V> {
    /// Create a cache whose entries expire after `ttl_seconds`.
    pub fn new(ttl_seconds: i64, metrics: EngineMetrics) -> Self {
        Self {
            entries: DashMap::new(),
            tag_index: DashMap::new(),
            ttl: Duration::seconds(ttl_seconds),
            metrics,
        }
    }

    /// Get a value if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(self.ttl) {
                self.metrics.record_cache_hit();
                return Some(entry.value.clone());
            }

            drop(entry);
            self.remove(key);
        }

        self.metrics.record_cache_miss();
        None
    }

    /// Insert a value under a key, with invalidation tags.
    pub fn insert(&self, key: impl Into<String>, value: V, tags: HashSet<CacheTag>) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            tags: tags.clone(),
            created_at: Utc::now(),
        };

        self.entries.insert(key.clone(), entry);

        for tag in tags {
            self.tag_index.entry(tag).or_default().insert(key.clone());
        }
    }

    /// Drop every entry carrying the tag.
    pub fn invalidate_by_tag(&self, tag: &CacheTag) {
        if let Some(keys) = self.tag_index.get(tag) {
            let keys_to_remove: Vec<_> = keys.iter().cloned().collect();
            drop(keys);

            for key in keys_to_remove {
                self.remove(&key);
            }
        }
    }

    /// Drop every entry computed for the subject.
    pub fn invalidate_subject(&self, subject: &str) {
        self.invalidate_by_tag(&CacheTag::Subject(subject.to_string()));
    }

    /// Drop every entry involving the namespace.
    pub fn invalidate_namespace(&self, namespace: &str) {
        self.invalidate_by_tag(&CacheTag::Namespace(namespace.to_string()));
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
        self.tag_index.clear();
    }

    /// Number of live entries (including not-yet-collected expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            for tag in &entry.tags {
                if let Some(mut keys) = self.tag_index.get_mut(tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        drop(keys);
                        self.tag_index.remove(tag);
                    }
                }
            }
        }
    }
}

/// The deterministic cache key for a per-resource access fan-out.
pub fn access_review_key(namespace: &str, verbs: &[&str], group: &str, resource: &str) -> String {
    format!(
        "access-review/{namespace}/{}/{group}/{resource}",
        verbs.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> RequestCache<u32> {
        RequestCache::new(300, EngineMetrics::new())
    }

    fn tags(tag: CacheTag) -> HashSet<CacheTag> {
        HashSet::from([tag])
    }

    #[test]
    fn test_basic_roundtrip() {
        let cache = cache();
        cache.insert("k", 7, tags(CacheTag::Subject("user1".to_string())));

        assert_eq!(cache.get("k"), Some(7));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let metrics = EngineMetrics::new();
        let cache = RequestCache::new(0, metrics);
        cache.insert("k", 7, HashSet::new());

        // TTL of zero expires immediately.
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_by_subject() {
        let cache = cache();
        cache.insert("a", 1, tags(CacheTag::Subject("user1".to_string())));
        cache.insert("b", 2, tags(CacheTag::Subject("user2".to_string())));

        cache.invalidate_subject("user1");

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_invalidate_by_namespace_shared_tag() {
        let cache = cache();
        let tag = CacheTag::Namespace("org-test".to_string());
        cache.insert("a", 1, tags(tag.clone()));
        cache.insert("b", 2, tags(tag));

        cache.invalidate_namespace("org-test");

        assert!(cache.is_empty());
    }

    #[test]
    fn test_metrics_wiring() {
        let metrics = EngineMetrics::new();
        let cache = RequestCache::new(300, metrics.clone());
        cache.insert("k", 7, HashSet::new());

        cache.get("k");
        cache.get("missing");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
    }

    #[test]
    fn test_access_review_key_is_deterministic() {
        assert_eq!(
            access_review_key("org-test", &["get", "list"], "apps.gs.io", "apps"),
            "access-review/org-test/get,list/apps.gs.io/apps"
        );
    }
}
