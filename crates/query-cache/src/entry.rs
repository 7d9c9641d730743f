//! Cache entries and payload sizing

use arrow::record_batch::RecordBatch;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Version of the data snapshot a cached result was computed against
pub type CacheVersion = i64;

/// The chunks making up one cached fragment result
pub type CacheResult<C = RecordBatch> = Vec<C>;

/// Fixed charge added to every entry's payload size
pub const DEFAULT_ENTRY_OVERHEAD: usize = std::mem::size_of::<CacheEntry>();

/// Self-reported memory footprint of a payload chunk
pub trait MemoryUsage {
    /// Bytes held by this chunk
    fn memory_usage(&self) -> usize;
}

impl MemoryUsage for RecordBatch {
    fn memory_usage(&self) -> usize {
        self.get_array_memory_size()
    }
}

impl<T: MemoryUsage + ?Sized> MemoryUsage for Arc<T> {
    fn memory_usage(&self) -> usize {
        (**self).memory_usage()
    }
}

/// A cached fragment result together with its version and access statistics.
///
/// The payload is shared through an `Arc`: a snapshot handed out by a probe
/// keeps the chunks alive even after the cache evicts or overwrites the entry.
/// Hit statistics are only mutated by the owning shard while it holds its lock,
/// so a returned entry is a snapshot taken right after the hit was recorded.
pub struct CacheEntry<C = RecordBatch> {
    /// When this entry was produced
    pub populate_time: Instant,
    /// Snapshot version the result was computed against
    pub version: CacheVersion,
    /// Time of the most recent hit, if any
    pub latest_hit_time: Option<Instant>,
    /// Number of probes that returned this entry
    pub hit_count: u64,
    result: Arc<CacheResult<C>>,
    payload_size: OnceLock<usize>,
}

impl<C> CacheEntry<C> {
    /// Create an entry with an explicit populate time
    pub fn new(populate_time: Instant, version: CacheVersion, result: CacheResult<C>) -> Self {
        Self {
            populate_time,
            version,
            latest_hit_time: None,
            hit_count: 0,
            result: Arc::new(result),
            payload_size: OnceLock::new(),
        }
    }

    /// Create an entry populated now
    pub fn now(version: CacheVersion, result: CacheResult<C>) -> Self {
        Self::new(Instant::now(), version, result)
    }

    /// The cached chunks
    pub fn result(&self) -> &Arc<CacheResult<C>> {
        &self.result
    }

    /// Number of cached chunks
    pub fn num_chunks(&self) -> usize {
        self.result.len()
    }

    pub(crate) fn record_hit(&mut self, now: Instant) {
        self.hit_count += 1;
        self.latest_hit_time = Some(now);
    }
}

impl<C: MemoryUsage> CacheEntry<C> {
    /// Sum of the chunks' memory usage, computed once
    pub fn payload_size(&self) -> usize {
        *self
            .payload_size
            .get_or_init(|| {
                self.result
                    .iter()
                    .map(MemoryUsage::memory_usage)
                    .fold(0, usize::saturating_add)
            })
    }

    /// Bytes charged for this entry with the given per-entry overhead.
    ///
    /// Always positive: a zero-charge entry could never be evicted.
    pub fn charge(&self, entry_overhead: usize) -> usize {
        entry_overhead.max(1).saturating_add(self.payload_size())
    }

    /// Bytes charged for this entry with the default overhead
    pub fn size(&self) -> usize {
        self.charge(DEFAULT_ENTRY_OVERHEAD)
    }
}

impl<C> Clone for CacheEntry<C> {
    fn clone(&self) -> Self {
        Self {
            populate_time: self.populate_time,
            version: self.version,
            latest_hit_time: self.latest_hit_time,
            hit_count: self.hit_count,
            result: Arc::clone(&self.result),
            payload_size: self.payload_size.clone(),
        }
    }
}

impl<C> fmt::Debug for CacheEntry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("version", &self.version)
            .field("num_chunks", &self.result.len())
            .field("hit_count", &self.hit_count)
            .field("populate_time", &self.populate_time)
            .field("latest_hit_time", &self.latest_hit_time)
            .finish()
    }
}
