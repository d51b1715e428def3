//! Metrics collection for the permission engine.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for permission engine operations.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Number of rules reviews issued.
    rules_reviews: Arc<AtomicU64>,
    /// Number of access reviews issued (all three review kinds).
    access_reviews: Arc<AtomicU64>,
    /// Number of listing calls issued.
    listings: Arc<AtomicU64>,
    /// Number of request-cache hits.
    cache_hits: Arc<AtomicU64>,
    /// Number of request-cache misses.
    cache_misses: Arc<AtomicU64>,
    /// Number of forbidden responses observed.
    forbidden_responses: Arc<AtomicU64>,
    /// Error counts by kind.
    error_counts: Arc<DashMap<String, AtomicU64>>,
}

impl EngineMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issued rules review.
    pub fn record_rules_review(&self) {
        self.rules_reviews.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an issued access review.
    pub fn record_access_review(&self) {
        self.access_reviews.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an issued listing call.
    pub fn record_listing(&self) {
        self.listings.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request-cache hit.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request-cache miss.
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a forbidden response.
    pub fn record_forbidden(&self) {
        self.forbidden_responses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an error by kind.
    pub fn record_error(&self, kind: &str) {
        self.error_counts
            .entry(kind.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rules_reviews: self.rules_reviews.load(Ordering::Relaxed),
            access_reviews: self.access_reviews.load(Ordering::Relaxed),
            listings: self.listings.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            forbidden_responses: self.forbidden_responses.load(Ordering::Relaxed),
            error_counts: self
                .error_counts
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// A point-in-time view of the engine's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Number of rules reviews issued.
    pub rules_reviews: u64,
    /// Number of access reviews issued.
    pub access_reviews: u64,
    /// Number of listing calls issued.
    pub listings: u64,
    /// Number of request-cache hits.
    pub cache_hits: u64,
    /// Number of request-cache misses.
    pub cache_misses: u64,
    /// Number of forbidden responses observed.
    pub forbidden_responses: u64,
    /// Error counts by kind.
    pub error_counts: HashMap<String, u64>,
}

impl MetricsSnapshot {
    /// Cache hit ratio over all cache lookups, or 0 when none happened.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }

        self.cache_hits as f64 / total as f64
    }
}
