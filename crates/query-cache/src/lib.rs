//! Versioned, memory-accounted query fragment cache
//!
//! This crate lets the executor skip recomputing a fragment by caching its
//! result chunks under a fingerprint key, together with the version of the
//! data the result was computed against.
//!
//! # Features
//!
//! - **Byte Budget**: Every entry is charged its payload size plus a fixed
//!   overhead; usage never exceeds capacity once an operation returns
//! - **LRU Eviction**: Least recently used entries are evicted first
//! - **Sharding**: Keys are hashed onto independently locked shards to keep
//!   contention low under many execution threads
//! - **Versions**: Entries carry a version that the caller checks on probe
//! - **Statistics**: Lookup, hit and eviction counters
//!
//! # Example
//!
//! ```ignore
//! use query_cache::{CacheEntry, CacheKey, CacheManager};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(CacheManager::new(512 * 1024 * 1024));
//! let key = CacheKey::for_tablet(&digest, tablet_id);
//!
//! match cache.probe(&key)? {
//!     Some(entry) if entry.version == tablet_version => return Ok(entry.result().clone()),
//!     _ => {}
//! }
//!
//! let batches = compute_fragment()?;
//! cache.populate(key, CacheEntry::now(tablet_version, batches))?;
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod manager;
pub mod shard;
pub mod sharded;
pub mod stats;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CacheResult, CacheVersion, MemoryUsage};
pub use error::{CacheError, Result};
pub use key::CacheKey;
pub use manager::CacheManager;
pub use shard::Shard;
pub use sharded::ShardedCache;
pub use stats::{CacheMetrics, ShardStats};
