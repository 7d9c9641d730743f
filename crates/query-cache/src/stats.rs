//! Cache statistics tracking

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters owned by a single shard.
///
/// Written while the shard lock is held, read without it.
#[derive(Debug, Default)]
pub struct ShardStats {
    lookups: AtomicU64,
    hits: AtomicU64,
    evictions: AtomicU64,
}

impl ShardStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a probe, hit or miss
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache hit. Must follow the hit's `record_lookup`.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Release);
    }

    /// Record entries evicted to make room
    pub fn record_evictions(&self, count: u64) {
        if count > 0 {
            self.evictions.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// `(lookups, hits)` with `hits <= lookups`.
    ///
    /// Hits are loaded first: acquiring a hit makes its earlier lookup
    /// increment visible to the lookup load that follows.
    pub fn lookups_and_hits(&self) -> (u64, u64) {
        let hits = self.hits.load(Ordering::Acquire);
        let lookups = self.lookups.load(Ordering::Acquire);
        (lookups, hits)
    }
}

/// Point-in-time view of the whole cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    /// Total byte budget
    pub capacity: usize,
    /// Bytes currently charged by resident entries
    pub memory_usage: usize,
    /// Number of resident entries
    pub entry_count: usize,
    /// Number of probes since creation
    pub lookup_count: u64,
    /// Number of probes that found an entry
    pub hit_count: u64,
    /// Number of entries evicted by capacity pressure
    pub eviction_count: u64,
}

impl CacheMetrics {
    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        if self.lookup_count == 0 {
            0.0
        } else {
            self.hit_count as f64 / self.lookup_count as f64
        }
    }

    /// Number of probes that found nothing
    pub fn miss_count(&self) -> u64 {
        self.lookup_count.saturating_sub(self.hit_count)
    }

    /// Fraction of the byte budget in use (0.0 to 1.0)
    pub fn usage_ratio(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.memory_usage as f64 / self.capacity as f64
        }
    }
}
