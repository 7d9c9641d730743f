//! Cached Fragment Executor
//!
//! Runs query fragments through the fragment result cache: probe by key,
//! reuse a hit whose version matches the data about to be read, otherwise
//! compute and populate.

use arrow::record_batch::RecordBatch;
use query_cache::{CacheEntry, CacheKey, CacheManager, CacheMetrics, CacheResult, CacheVersion};
use query_core::{QueryError, Result};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A fragment whose output can be cached
pub trait FragmentSource: Debug + Send + Sync {
    /// Version of the data the fragment reads
    fn version(&self) -> CacheVersion;

    /// Compute the fragment's result from scratch
    fn compute(&self) -> Result<Vec<RecordBatch>>;
}

/// Outcome of probing the cache for a fragment
#[derive(Debug)]
pub enum CacheProbe {
    /// A resident entry computed against the expected version
    Hit(CacheEntry),
    /// A resident entry computed against some other version
    Stale { cached_version: CacheVersion },
    /// Nothing usable in the cache
    Miss,
}

/// Result of running one fragment
#[derive(Debug, Clone)]
pub struct FragmentResult {
    /// The fragment's chunks, shared with the cache when cached
    pub batches: Arc<CacheResult>,
    /// Version the chunks were computed against
    pub version: CacheVersion,
    /// Whether the chunks came from the cache
    pub from_cache: bool,
}

impl FragmentResult {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// Executes fragments with the shared result cache in front of them.
///
/// The cache only accelerates execution: any cache error is logged and
/// treated as a miss, so it never fails the fragment.
pub struct CachedFragmentExecutor {
    /// The shared query cache
    cache: Arc<CacheManager>,
    /// Hits discarded because their version did not match
    stale_hits: AtomicU64,
}

impl CachedFragmentExecutor {
    /// Create an executor using a shared cache
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self {
            cache,
            stale_hits: AtomicU64::new(0),
        }
    }

    /// Probe the cache for `key`, accepting only entries at `expected_version`
    pub fn probe(&self, key: &CacheKey, expected_version: CacheVersion) -> CacheProbe {
        match self.cache.probe(key) {
            Ok(Some(entry)) if entry.version == expected_version => CacheProbe::Hit(entry),
            Ok(Some(entry)) => {
                self.stale_hits.fetch_add(1, Ordering::Relaxed);
                CacheProbe::Stale {
                    cached_version: entry.version,
                }
            }
            Ok(None) => CacheProbe::Miss,
            Err(e) => {
                warn!(error = %e, key = ?key, "Query cache probe failed, treating as miss");
                CacheProbe::Miss
            }
        }
    }

    /// Execute a fragment, reusing a version-consistent cached result
    pub fn execute(&self, key: &CacheKey, source: &dyn FragmentSource) -> Result<FragmentResult> {
        let version = source.version();

        match self.probe(key, version) {
            CacheProbe::Hit(entry) => {
                debug!(key = ?key, version, hits = entry.hit_count, "Query cache hit");
                return Ok(FragmentResult {
                    batches: Arc::clone(entry.result()),
                    version: entry.version,
                    from_cache: true,
                });
            }
            CacheProbe::Stale { cached_version } => {
                debug!(key = ?key, cached_version, version, "Discarding stale cache entry");
            }
            CacheProbe::Miss => {}
        }

        let entry = CacheEntry::now(version, source.compute()?);
        let result = FragmentResult {
            batches: Arc::clone(entry.result()),
            version,
            from_cache: false,
        };

        if let Err(e) = self.cache.populate(key.clone(), entry) {
            warn!(error = %e, key = ?key, "Query cache populate failed, continuing uncached");
        }

        Ok(result)
    }

    /// Execute without caching (bypass cache)
    pub fn execute_uncached(&self, source: &dyn FragmentSource) -> Result<FragmentResult> {
        Ok(FragmentResult {
            batches: Arc::new(source.compute()?),
            version: source.version(),
            from_cache: false,
        })
    }

    /// Change the cache's byte budget
    pub fn resize_cache(&self, capacity: usize) -> Result<()> {
        self.cache
            .set_capacity(capacity)
            .map_err(|e| QueryError::CacheError(e.to_string()))
    }

    /// Drop every cached fragment
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Get the underlying cache
    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Get cache metrics
    pub fn cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics()
    }

    /// Number of hits discarded for a version mismatch
    pub fn stale_hits(&self) -> u64 {
        self.stale_hits.load(Ordering::Relaxed)
    }
}

impl Debug for CachedFragmentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFragmentExecutor")
            .field("cache", &self.cache)
            .field("stale_hits", &self.stale_hits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use query_cache::CacheConfig;
    use std::sync::atomic::{AtomicI64, AtomicUsize};

    #[derive(Debug)]
    struct TestSource {
        version: AtomicI64,
        computed: AtomicUsize,
        fail: bool,
    }

    impl TestSource {
        fn new(version: i64) -> Self {
            Self {
                version: AtomicI64::new(version),
                computed: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(1)
            }
        }

        fn computed(&self) -> usize {
            self.computed.load(Ordering::SeqCst)
        }
    }

    impl FragmentSource for TestSource {
        fn version(&self) -> CacheVersion {
            self.version.load(Ordering::SeqCst)
        }

        fn compute(&self) -> Result<Vec<RecordBatch>> {
            if self.fail {
                return Err(QueryError::ExecutionError("scan failed".to_string()));
            }
            self.computed.fetch_add(1, Ordering::SeqCst);
            Ok(vec![create_test_batch(vec![1, 2, 3])])
        }
    }

    fn create_test_batch(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let array = Arc::new(Int64Array::from(values));
        RecordBatch::try_new(schema, vec![array]).unwrap()
    }

    fn executor() -> CachedFragmentExecutor {
        CachedFragmentExecutor::new(Arc::new(CacheManager::new(16 * 1024 * 1024)))
    }

    #[test]
    fn test_cached_execution() {
        let executor = executor();
        let source = TestSource::new(1);
        let key = CacheKey::for_tablet(b"agg-digest", 10001);

        // First execution - cache miss
        let first = executor.execute(&key, &source).unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.num_rows(), 3);
        assert_eq!(source.computed(), 1);

        // Second execution - cache hit
        let second = executor.execute(&key, &source).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.version, 1);
        assert_eq!(source.computed(), 1);
        assert!(Arc::ptr_eq(&first.batches, &second.batches));

        let metrics = executor.cache_metrics();
        assert_eq!(metrics.lookup_count, 2);
        assert_eq!(metrics.hit_count, 1);
    }

    #[test]
    fn test_stale_entry_recomputed() {
        let executor = executor();
        let source = TestSource::new(1);
        let key = CacheKey::from("scan-fragment");

        executor.execute(&key, &source).unwrap();
        source.version.store(2, Ordering::SeqCst);

        assert!(matches!(
            executor.probe(&key, 2),
            CacheProbe::Stale { cached_version: 1 }
        ));

        let result = executor.execute(&key, &source).unwrap();
        assert!(!result.from_cache);
        assert_eq!(result.version, 2);
        assert_eq!(source.computed(), 2);
        assert_eq!(executor.stale_hits(), 2);

        // the recomputed result replaced the stale one
        let result = executor.execute(&key, &source).unwrap();
        assert!(result.from_cache);
        assert_eq!(source.computed(), 2);
    }

    #[test]
    fn test_disabled_cache_never_fails_fragment() {
        let cache = Arc::new(CacheManager::with_config(CacheConfig::disabled()));
        let executor = CachedFragmentExecutor::new(cache);
        let source = TestSource::new(1);
        let key = CacheKey::from("fragment");

        for _ in 0..3 {
            let result = executor.execute(&key, &source).unwrap();
            assert!(!result.from_cache);
        }
        assert_eq!(source.computed(), 3);
        assert!(matches!(
            executor.resize_cache(1024),
            Err(QueryError::CacheError(_))
        ));
    }

    #[test]
    fn test_invalid_key_treated_as_miss() {
        let executor = executor();
        let source = TestSource::new(1);
        let empty = CacheKey::new(b"");

        assert!(matches!(executor.probe(&empty, 1), CacheProbe::Miss));
        let result = executor.execute(&empty, &source).unwrap();
        assert!(!result.from_cache);
        assert!(executor.cache().is_empty());
    }

    #[test]
    fn test_compute_error_propagates() {
        let executor = executor();
        let source = TestSource::failing();

        let err = executor
            .execute(&CacheKey::from("fragment"), &source)
            .unwrap_err();
        assert!(matches!(err, QueryError::ExecutionError(_)));
        assert!(executor.cache().is_empty());
    }

    #[test]
    fn test_uncached_and_clear() {
        let executor = executor();
        let source = TestSource::new(4);
        let key = CacheKey::from("fragment");

        let result = executor.execute_uncached(&source).unwrap();
        assert_eq!(result.version, 4);
        assert!(executor.cache().is_empty());

        executor.execute(&key, &source).unwrap();
        assert_eq!(executor.cache().len(), 1);

        executor.clear_cache();
        assert!(executor.cache().is_empty());
        assert!(matches!(executor.probe(&key, 4), CacheProbe::Miss));

        executor.resize_cache(1).unwrap();
        assert_eq!(executor.cache().capacity(), 1);
    }
}
