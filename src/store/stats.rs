//! Cache Statistics Module
//!
//! Tracks cache outcome counters across concurrent requests.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Outcome counters for the response cache.
///
/// Shared by value across request tasks, so every counter is atomic.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    invalidated: AtomicU64,
    bypassed: AtomicU64,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Recorders ==
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidated(&self) {
        self.invalidated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bypass(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        StatsSnapshot {
            hits,
            misses,
            expired: self.expired.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

// == Stats Snapshot ==
/// Serializable view of the counters at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Requests served from the cache
    pub hits: u64,
    /// Requests that executed the downstream handler and were cached
    pub misses: u64,
    /// Requests that found only a stale entry
    pub expired: u64,
    /// Requests that explicitly dropped an entry
    pub invalidated: u64,
    /// Requests that opted out via Cache-Control
    pub bypassed: u64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}
