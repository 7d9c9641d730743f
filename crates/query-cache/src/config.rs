//! Cache configuration options

use crate::entry::DEFAULT_ENTRY_OVERHEAD;
use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Upper bound for `shard_bits` (1024 shards)
pub const MAX_SHARD_BITS: u8 = 10;

/// Configuration for the query cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total byte budget shared by all shards
    pub capacity_bytes: usize,
    /// Number of shard bits (shards = 2^shard_bits)
    pub shard_bits: u8,
    /// Fixed bytes charged per entry on top of the payload
    pub entry_overhead_bytes: usize,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 512 * 1024 * 1024, // 512 MB
            shard_bits: 5,                     // 32 shards
            entry_overhead_bytes: DEFAULT_ENTRY_OVERHEAD,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with the given byte budget
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            ..Default::default()
        }
    }

    /// Create a disabled cache configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Parse a configuration from a JSON document
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: CacheConfig =
            serde_json::from_str(contents).map_err(|e| CacheError::Config(e.to_string()))?;
        Ok(config.validated())
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }

    /// Clamp out-of-range settings: `shard_bits` to [`MAX_SHARD_BITS`] and
    /// the entry overhead to at least one byte.
    ///
    /// Applied by the manager and the JSON loaders alike.
    pub fn validated(mut self) -> Self {
        if self.shard_bits > MAX_SHARD_BITS {
            warn!(
                shard_bits = self.shard_bits,
                max = MAX_SHARD_BITS,
                "shard_bits out of range, clamping"
            );
            self.shard_bits = MAX_SHARD_BITS;
        }
        self.entry_overhead_bytes = self.entry_overhead_bytes.max(1);
        self
    }

    /// Number of shards the cache is split into
    pub fn num_shards(&self) -> usize {
        1 << self.shard_bits.min(MAX_SHARD_BITS)
    }

    /// Per-entry overhead, never zero so every entry has a positive charge
    pub fn entry_overhead(&self) -> usize {
        self.entry_overhead_bytes.max(1)
    }

    /// Set the total byte budget
    pub fn with_capacity(mut self, capacity_bytes: usize) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    /// Set the number of shard bits
    pub fn with_shard_bits(mut self, shard_bits: u8) -> Self {
        self.shard_bits = shard_bits;
        self
    }

    /// Set the per-entry overhead
    pub fn with_entry_overhead(mut self, entry_overhead_bytes: usize) -> Self {
        self.entry_overhead_bytes = entry_overhead_bytes;
        self
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
