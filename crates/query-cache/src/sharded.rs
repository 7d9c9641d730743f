//! Hash-routed collection of shards

use crate::entry::{CacheEntry, MemoryUsage};
use crate::key::CacheKey;
use crate::shard::Shard;
use crate::stats::CacheMetrics;
use ahash::AHasher;
use std::hash::{Hash, Hasher};

/// Split `total` into `shards` capacities that sum exactly to `total`.
///
/// The remainder goes one byte each to the leading shards.
pub fn split_capacity(total: usize, shards: usize) -> impl Iterator<Item = usize> {
    let shards = shards.max(1);
    let base = total / shards;
    let remainder = total % shards;
    (0..shards).map(move |i| base + usize::from(i < remainder))
}

/// Fixed set of independently locked shards.
///
/// Each key lives in exactly one shard chosen by a stable hash, so no
/// operation ever holds more than one shard lock. Aggregates are summed from
/// per-shard atomics and are not a consistent cross-shard snapshot.
pub struct ShardedCache<C> {
    shards: Box<[Shard<C>]>,
}

impl<C: MemoryUsage> ShardedCache<C> {
    pub fn new(capacity: usize, num_shards: usize, entry_overhead: usize) -> Self {
        let shards = split_capacity(capacity, num_shards)
            .map(|shard_capacity| Shard::new(shard_capacity, entry_overhead))
            .collect();
        Self { shards }
    }

    /// Index of the shard owning `key`
    pub fn route(&self, key: &CacheKey) -> usize {
        // AHasher::default uses fixed keys, so routing is stable
        let mut hasher = AHasher::default();
        key.as_bytes().hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub fn shard_for(&self, key: &CacheKey) -> &Shard<C> {
        &self.shards[self.route(key)]
    }

    /// Store `entry` under `key` in its owning shard
    pub fn populate(&self, key: CacheKey, entry: CacheEntry<C>) {
        self.shard_for(&key).put(key, entry);
    }

    /// Look up `key` in its owning shard
    pub fn probe(&self, key: &CacheKey) -> Option<CacheEntry<C>> {
        self.shard_for(key).get(key)
    }

    pub fn remove(&self, key: &CacheKey) -> bool {
        self.shard_for(key).remove(key)
    }

    /// Redistribute a new total capacity across the shards
    pub fn set_capacity(&self, capacity: usize) {
        for (shard, shard_capacity) in self
            .shards
            .iter()
            .zip(split_capacity(capacity, self.shards.len()))
        {
            shard.set_capacity(shard_capacity);
        }
    }

    /// Clear every shard in turn.
    ///
    /// Each shard empties atomically under its own lock; a concurrent probe
    /// may still observe shards that have not been reached yet.
    pub fn invalidate_all(&self) {
        for shard in self.shards.iter() {
            shard.invalidate_all();
        }
    }
}

impl<C> ShardedCache<C> {
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[Shard<C>] {
        &self.shards
    }

    pub fn memory_usage(&self) -> usize {
        self.shards.iter().map(Shard::usage).sum()
    }

    pub fn capacity(&self) -> usize {
        self.shards.iter().map(Shard::capacity).sum()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(Shard::is_empty)
    }

    pub fn lookup_count(&self) -> u64 {
        self.shards.iter().map(|s| s.stats().lookups()).sum()
    }

    pub fn hit_count(&self) -> u64 {
        self.shards.iter().map(|s| s.stats().hits()).sum()
    }

    pub fn eviction_count(&self) -> u64 {
        self.shards.iter().map(|s| s.stats().evictions()).sum()
    }

    /// Lookup and hit totals read shard by shard as consistent pairs, so the
    /// hit total never exceeds the lookup total
    pub fn lookups_and_hits(&self) -> (u64, u64) {
        self.shards
            .iter()
            .map(|s| s.stats().lookups_and_hits())
            .fold((0, 0), |(lookups, hits), (l, h)| (lookups + l, hits + h))
    }

    pub fn metrics(&self) -> CacheMetrics {
        let (lookup_count, hit_count) = self.lookups_and_hits();
        CacheMetrics {
            capacity: self.capacity(),
            memory_usage: self.memory_usage(),
            entry_count: self.len(),
            lookup_count,
            hit_count,
            eviction_count: self.eviction_count(),
        }
    }
}

impl<C> std::fmt::Debug for ShardedCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedCache")
            .field("num_shards", &self.num_shards())
            .field("capacity", &self.capacity())
            .field("memory_usage", &self.memory_usage())
            .field("entries", &self.len())
            .finish()
    }
}
