//! Fragment Cache Example
//!
//! Demonstrates versioned fragment caching, LRU eviction and statistics.

use anyhow::Result;
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use query_cache::{CacheConfig, CacheEntry, CacheKey, CacheManager, CacheVersion};
use query_executor::{CachedFragmentExecutor, FragmentSource};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Fragment Cache Example ===\n");

    // Example 1: Basic populate/probe
    basic_caching()?;

    // Example 2: Version checks in the executor
    versioned_fragments()?;

    // Example 3: Eviction and statistics
    cache_statistics()?;

    println!("\n=== All caching examples completed! ===");
    Ok(())
}

fn sample_batch(ids: Vec<i64>) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
    ]));
    let names: Vec<String> = ids.iter().map(|id| format!("user-{}", id)).collect();

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(names)),
        ],
    )?)
}

/// Example 1: Basic cache populate/probe operations
fn basic_caching() -> Result<()> {
    println!("--- Example 1: Basic Caching ---\n");

    let cache: CacheManager = CacheManager::new(64 * 1024 * 1024);
    println!(
        "Cache created with {} bytes across {} shards\n",
        cache.capacity(),
        CacheConfig::default().num_shards()
    );

    let key = CacheKey::for_tablet(b"select-users-digest", 10001);
    let batches = vec![sample_batch(vec![1, 2, 3])?];
    cache.populate(key.clone(), CacheEntry::now(7, batches))?;
    println!("Cached tablet 10001 at version 7");

    if let Some(entry) = cache.probe(&key)? {
        println!(
            "Cache HIT! version={} chunks={} hits={}",
            entry.version,
            entry.num_chunks(),
            entry.hit_count
        );
    }

    let missing = CacheKey::for_tablet(b"select-users-digest", 10002);
    if cache.probe(&missing)?.is_none() {
        println!("Expected MISS for uncached tablet");
    }

    Ok(())
}

#[derive(Debug)]
struct TabletScan {
    version: AtomicI64,
}

impl FragmentSource for TabletScan {
    fn version(&self) -> CacheVersion {
        self.version.load(Ordering::SeqCst)
    }

    fn compute(&self) -> query_core::Result<Vec<RecordBatch>> {
        println!("  computing fragment at version {}", self.version());
        let batch = sample_batch(vec![self.version(), self.version() * 10])
            .map_err(|e| query_core::QueryError::ExecutionError(e.to_string()))?;
        Ok(vec![batch])
    }
}

/// Example 2: The executor discards entries computed against older data
fn versioned_fragments() -> Result<()> {
    println!("\n--- Example 2: Versioned Fragments ---\n");

    let cache = Arc::new(CacheManager::new(16 * 1024 * 1024));
    let executor = CachedFragmentExecutor::new(Arc::clone(&cache));
    let scan = TabletScan {
        version: AtomicI64::new(1),
    };
    let key = CacheKey::for_tablet(b"sum-by-region-digest", 20001);

    let first = executor.execute(&key, &scan)?;
    println!("Run 1: from_cache={} version={}", first.from_cache, first.version);

    let second = executor.execute(&key, &scan)?;
    println!("Run 2: from_cache={} version={}", second.from_cache, second.version);

    // new data lands in the tablet
    scan.version.store(2, Ordering::SeqCst);
    let third = executor.execute(&key, &scan)?;
    println!("Run 3: from_cache={} version={}", third.from_cache, third.version);
    println!("Stale hits discarded: {}", executor.stale_hits());

    Ok(())
}

/// Example 3: Eviction under a small byte budget
fn cache_statistics() -> Result<()> {
    println!("\n--- Example 3: Cache Statistics ---\n");

    let batch = sample_batch((0..64).collect())?;
    let entry_size = CacheEntry::now(0, vec![batch.clone()]).size();

    // room for about four entries in a single shard
    let cache: CacheManager = CacheManager::with_config(
        CacheConfig::new(entry_size * 4).with_shard_bits(0),
    );

    for i in 0..8 {
        let key = CacheKey::from(format!("fragment-{}", i));
        cache.populate(key, CacheEntry::now(1, vec![batch.clone()]))?;
    }
    println!("Cached 8 fragments of {} bytes each", entry_size);

    for i in 0..10 {
        let key = CacheKey::from(format!("fragment-{}", i % 9));
        let _ = cache.probe(&key)?;
    }
    println!("Performed 10 lookups (mix of hits and misses)\n");

    let metrics = cache.metrics();
    println!("Cache Statistics:");
    println!("  Lookups:   {}", metrics.lookup_count);
    println!("  Hits:      {}", metrics.hit_count);
    println!("  Hit Rate:  {:.1}%", metrics.hit_rate() * 100.0);
    println!("  Evictions: {}", metrics.eviction_count);
    println!("  Entries:   {}", metrics.entry_count);
    println!("  Memory:    {} / {} bytes", metrics.memory_usage, metrics.capacity);

    cache.invalidate_all();
    println!("\nCache invalidated!");
    println!("  Memory after: {} bytes", cache.memory_usage());

    Ok(())
}
