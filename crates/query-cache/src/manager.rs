//! Public façade over the sharded cache

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, MemoryUsage};
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::sharded::ShardedCache;
use crate::stats::CacheMetrics;
use arrow::record_batch::RecordBatch;
use tracing::info;

/// Process-wide cache of fragment results.
///
/// The manager stores and returns entries verbatim; it has no notion of the
/// current data version. Callers compare [`CacheEntry::version`] against the
/// version they are about to read and discard stale hits themselves.
///
/// One manager is built at engine start-up and shared as `Arc<CacheManager>`.
pub struct CacheManager<C = RecordBatch> {
    cache: Option<ShardedCache<C>>,
}

impl<C: MemoryUsage> CacheManager<C> {
    /// Create a cache with `capacity` bytes and default settings otherwise
    pub fn new(capacity: usize) -> Self {
        Self::with_config(CacheConfig::new(capacity))
    }

    /// Create a cache from a configuration.
    ///
    /// A disabled configuration yields a manager without storage whose
    /// populate and probe report [`CacheError::NotInitialized`].
    pub fn with_config(config: CacheConfig) -> Self {
        let config = config.validated();
        if !config.enabled {
            info!("Query cache disabled");
            return Self { cache: None };
        }

        let cache = ShardedCache::new(
            config.capacity_bytes,
            config.num_shards(),
            config.entry_overhead(),
        );
        info!(
            capacity = config.capacity_bytes,
            shards = cache.num_shards(),
            entry_overhead = config.entry_overhead(),
            "Query cache created"
        );
        Self { cache: Some(cache) }
    }

    /// Store `value` under `key`, replacing whatever was there regardless of
    /// its version.
    ///
    /// Capacity pressure is never an error; it only triggers eviction.
    pub fn populate(&self, key: CacheKey, value: CacheEntry<C>) -> Result<()> {
        let cache = self.storage()?;
        check_key(&key)?;
        cache.populate(key, value);
        Ok(())
    }

    /// Look up `key`.
    ///
    /// Misses and evicted entries both come back as `Ok(None)`. A hit is a
    /// snapshot sharing the cached payload.
    pub fn probe(&self, key: &CacheKey) -> Result<Option<CacheEntry<C>>> {
        let cache = self.storage()?;
        check_key(key)?;
        Ok(cache.probe(key))
    }

    /// Drop a single entry, returning whether it was resident
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let cache = self.storage()?;
        check_key(key)?;
        Ok(cache.remove(key))
    }

    /// Change the total byte budget; shrinking evicts immediately
    pub fn set_capacity(&self, capacity: usize) -> Result<()> {
        let cache = self.storage()?;
        let old = cache.capacity();
        cache.set_capacity(capacity);
        info!(old, new = capacity, "Query cache capacity changed");
        Ok(())
    }

    /// Empty every shard. Returns once all shards have been cleared.
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            let entries = cache.len();
            let bytes = cache.memory_usage();
            cache.invalidate_all();
            info!(entries, bytes, "Query cache invalidated");
        }
    }
}

impl<C> CacheManager<C> {
    /// Whether the manager has cache storage
    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn memory_usage(&self) -> usize {
        self.cache.as_ref().map_or(0, ShardedCache::memory_usage)
    }

    pub fn capacity(&self) -> usize {
        self.cache.as_ref().map_or(0, ShardedCache::capacity)
    }

    pub fn lookup_count(&self) -> u64 {
        self.cache.as_ref().map_or(0, ShardedCache::lookup_count)
    }

    pub fn hit_count(&self) -> u64 {
        self.cache.as_ref().map_or(0, ShardedCache::hit_count)
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, ShardedCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.cache
            .as_ref()
            .map(ShardedCache::metrics)
            .unwrap_or_default()
    }

    fn storage(&self) -> Result<&ShardedCache<C>> {
        self.cache.as_ref().ok_or(CacheError::NotInitialized)
    }
}

impl<C> std::fmt::Debug for CacheManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("enabled", &self.is_enabled())
            .field("capacity", &self.capacity())
            .field("memory_usage", &self.memory_usage())
            .field("entries", &self.len())
            .finish()
    }
}

fn check_key(key: &CacheKey) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidArgument("cache key must not be empty".to_string()));
    }
    Ok(())
}
