//! A single byte-accounted LRU partition of the cache

use crate::entry::{CacheEntry, MemoryUsage};
use crate::key::CacheKey;
use crate::stats::ShardStats;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::debug;

/// Resident entry and the charge it was admitted with
struct Slot<C> {
    entry: CacheEntry<C>,
    charge: usize,
}

struct ShardState<C> {
    index: LruCache<CacheKey, Slot<C>>,
    usage: usize,
    capacity: usize,
}

impl<C> ShardState<C> {
    /// Pop LRU entries until usage is at most `limit`
    fn evict_to(&mut self, limit: usize, evicted: &mut Vec<Slot<C>>) {
        while self.usage > limit {
            match self.index.pop_lru() {
                Some((_, slot)) => {
                    self.usage -= slot.charge;
                    evicted.push(slot);
                }
                None => break,
            }
        }
    }
}

/// Independently locked LRU store with a fixed byte budget.
///
/// Every operation runs under the shard's single mutex. Usage and capacity
/// are mirrored into atomics before the lock is released, so readers without
/// the lock only ever see settled values with `usage <= capacity`.
/// Evicted payloads are dropped after the lock is released.
pub struct Shard<C> {
    state: Mutex<ShardState<C>>,
    usage: AtomicUsize,
    capacity: AtomicUsize,
    len: AtomicUsize,
    entry_overhead: usize,
    stats: ShardStats,
}

impl<C: MemoryUsage> Shard<C> {
    pub fn new(capacity: usize, entry_overhead: usize) -> Self {
        Self {
            state: Mutex::new(ShardState {
                index: LruCache::unbounded(),
                usage: 0,
                capacity,
            }),
            usage: AtomicUsize::new(0),
            capacity: AtomicUsize::new(capacity),
            len: AtomicUsize::new(0),
            entry_overhead: entry_overhead.max(1),
            stats: ShardStats::new(),
        }
    }

    /// Look up `key`, promoting it to most recently used on a hit.
    ///
    /// The returned entry shares the payload and carries the updated hit stats.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<C>> {
        let mut state = self.state.lock();
        self.stats.record_lookup();

        let slot = state.index.get_mut(key)?;
        slot.entry.record_hit(Instant::now());
        self.stats.record_hit();
        Some(slot.entry.clone())
    }

    /// Insert or replace `key`, then evict from the LRU end until the shard
    /// fits its capacity.
    ///
    /// An entry larger than the whole shard is admitted and immediately
    /// evicted together with everything else, leaving the shard empty.
    pub fn put(&self, key: CacheKey, entry: CacheEntry<C>) {
        let charge = entry.charge(self.entry_overhead);
        let mut evicted = Vec::new();

        let mut state = self.state.lock();
        if let Some(old) = state.index.put(key, Slot { entry, charge }) {
            state.usage -= old.charge;
            evicted.push(old);
        }
        let replaced = evicted.len();

        if charge > state.capacity {
            debug!(
                charge,
                capacity = state.capacity,
                "Cache entry exceeds shard capacity, evicting shard"
            );
            while let Some((_, slot)) = state.index.pop_lru() {
                evicted.push(slot);
            }
            state.usage = 0;
        } else {
            // make room before charging so usage never exceeds capacity; the
            // new entry is most recently used and goes last
            let limit = state.capacity - charge;
            state.evict_to(limit, &mut evicted);
            state.usage += charge;
        }

        self.publish(&state);
        self.stats.record_evictions((evicted.len() - replaced) as u64);
        drop(state);
        drop(evicted);
    }

    /// Remove `key`, returning whether it was resident
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut state = self.state.lock();
        let removed = state.index.pop(key);
        if let Some(slot) = &removed {
            state.usage -= slot.charge;
            self.publish(&state);
        }
        drop(state);
        removed.is_some()
    }

    /// Change the byte budget, evicting LRU entries if it shrank
    pub fn set_capacity(&self, capacity: usize) {
        let mut evicted = Vec::new();
        let mut state = self.state.lock();
        state.capacity = capacity;
        state.evict_to(capacity, &mut evicted);
        self.publish(&state);
        self.stats.record_evictions(evicted.len() as u64);
        drop(state);
        drop(evicted);
    }

    /// Drop every entry and reset usage to zero.
    ///
    /// Payloads already handed out stay alive until their holders drop them.
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        let index = std::mem::replace(&mut state.index, LruCache::unbounded());
        state.usage = 0;
        self.publish(&state);
        drop(state);
        drop(index);
    }

    /// Whether `key` is resident, without touching recency or statistics
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().index.contains(key)
    }

    fn publish(&self, state: &ShardState<C>) {
        self.usage.store(state.usage, Ordering::Release);
        self.capacity.store(state.capacity, Ordering::Release);
        self.len.store(state.index.len(), Ordering::Release);
    }
}

impl<C> Shard<C> {
    pub fn usage(&self) -> usize {
        self.usage.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &ShardStats {
        &self.stats
    }
}

impl<C> std::fmt::Debug for Shard<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("capacity", &self.capacity())
            .field("usage", &self.usage())
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Chunk(usize);

    impl MemoryUsage for Chunk {
        fn memory_usage(&self) -> usize {
            self.0
        }
    }

    fn entry(version: i64, payload: usize) -> CacheEntry<Chunk> {
        CacheEntry::now(version, vec![Chunk(payload)])
    }

    fn key(s: &str) -> CacheKey {
        CacheKey::from(s)
    }

    #[test]
    fn test_put_get() {
        let shard = Shard::new(1000, 50);
        shard.put(key("a"), entry(1, 100));

        assert_eq!(shard.usage(), 150);
        assert_eq!(shard.len(), 1);

        let hit = shard.get(&key("a")).unwrap();
        assert_eq!(hit.version, 1);
        assert_eq!(hit.hit_count, 1);
        assert!(hit.latest_hit_time.is_some());

        let hit = shard.get(&key("a")).unwrap();
        assert_eq!(hit.hit_count, 2);

        assert!(shard.get(&key("b")).is_none());
        assert_eq!(shard.stats().lookups(), 3);
        assert_eq!(shard.stats().hits(), 2);
    }

    #[test]
    fn test_replace_adjusts_usage() {
        let shard = Shard::new(1000, 50);
        shard.put(key("a"), entry(1, 100));
        shard.put(key("a"), entry(2, 300));

        assert_eq!(shard.len(), 1);
        assert_eq!(shard.usage(), 350);
        assert_eq!(shard.get(&key("a")).unwrap().version, 2);
        assert_eq!(shard.stats().evictions(), 0);
    }

    #[test]
    fn test_lru_eviction_order() {
        // room for two 150-byte entries
        let shard = Shard::new(300, 50);
        shard.put(key("a"), entry(1, 100));
        shard.put(key("b"), entry(1, 100));
        shard.put(key("c"), entry(1, 100));

        assert!(!shard.contains(&key("a")));
        assert!(shard.contains(&key("b")));
        assert!(shard.contains(&key("c")));
        assert_eq!(shard.usage(), 300);
        assert_eq!(shard.stats().evictions(), 1);
    }

    #[test]
    fn test_get_refreshes_recency() {
        // room for three 150-byte entries
        let shard = Shard::new(450, 50);
        shard.put(key("a"), entry(1, 100));
        shard.put(key("b"), entry(1, 100));
        shard.put(key("c"), entry(1, 100));
        assert!(shard.get(&key("a")).is_some());

        shard.put(key("d"), entry(1, 100));

        assert!(shard.contains(&key("a")));
        assert!(!shard.contains(&key("b")));
        assert!(shard.contains(&key("c")));
        assert!(shard.contains(&key("d")));
    }

    #[test]
    fn test_oversized_entry_empties_shard() {
        let shard = Shard::new(300, 50);
        shard.put(key("a"), entry(1, 100));
        shard.put(key("huge"), entry(1, 1000));

        assert!(shard.is_empty());
        assert_eq!(shard.usage(), 0);
        assert!(shard.get(&key("huge")).is_none());
        assert_eq!(shard.stats().evictions(), 2);
    }

    #[test]
    fn test_entry_reporting_huge_size_does_not_overflow() {
        let shard = Shard::new(300, 50);
        shard.put(key("a"), entry(1, 100));
        shard.put(key("huge"), entry(1, usize::MAX));

        assert!(shard.is_empty());
        assert_eq!(shard.usage(), 0);

        let unbounded = Shard::new(usize::MAX, 50);
        unbounded.put(key("a"), entry(1, usize::MAX - 60));
        unbounded.put(key("b"), entry(1, 100));
        assert!(unbounded.usage() <= unbounded.capacity());
        assert_eq!(unbounded.len(), 1);
        assert!(unbounded.contains(&key("b")));
    }

    #[test]
    fn test_entry_exactly_at_capacity_is_kept() {
        let shard = Shard::new(300, 50);
        shard.put(key("a"), entry(1, 100));
        shard.put(key("full"), entry(1, 250));

        assert_eq!(shard.len(), 1);
        assert!(shard.contains(&key("full")));
        assert_eq!(shard.usage(), 300);
    }

    #[test]
    fn test_remove() {
        let shard = Shard::new(1000, 50);
        shard.put(key("a"), entry(1, 100));

        assert!(shard.remove(&key("a")));
        assert!(!shard.remove(&key("a")));
        assert_eq!(shard.usage(), 0);
    }

    #[test]
    fn test_set_capacity_shrinks() {
        let shard = Shard::new(600, 50);
        for name in ["a", "b", "c", "d"] {
            shard.put(key(name), entry(1, 100));
        }
        assert_eq!(shard.usage(), 600);

        shard.set_capacity(320);
        assert_eq!(shard.capacity(), 320);
        assert_eq!(shard.usage(), 300);
        assert!(shard.contains(&key("c")));
        assert!(shard.contains(&key("d")));

        shard.set_capacity(0);
        assert!(shard.is_empty());
    }

    #[test]
    fn test_invalidate_all_keeps_handles_alive() {
        let shard = Shard::new(1000, 50);
        shard.put(key("a"), entry(1, 100));
        let handle = shard.get(&key("a")).unwrap();

        shard.invalidate_all();

        assert_eq!(shard.usage(), 0);
        assert!(shard.is_empty());
        assert!(shard.get(&key("a")).is_none());
        assert_eq!(Arc::strong_count(handle.result()), 1);
        assert_eq!(handle.result()[0].0, 100);
        // lookups survive invalidation
        assert_eq!(shard.stats().lookups(), 2);
    }

    #[test]
    fn test_evicted_payload_outlives_eviction() {
        let shard = Shard::new(150, 50);
        shard.put(key("a"), entry(1, 100));
        let handle = shard.get(&key("a")).unwrap();

        shard.put(key("a"), entry(2, 100));

        assert_eq!(handle.version, 1);
        assert_eq!(handle.result()[0].0, 100);
        assert_eq!(shard.get(&key("a")).unwrap().version, 2);
    }
}
