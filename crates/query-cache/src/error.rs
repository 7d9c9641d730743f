//! Error types for the query cache

use thiserror::Error;

/// Errors surfaced by the cache boundary.
///
/// Misses, evictions and capacity pressure are not errors; they show up as
/// `Ok(None)` from a probe or as eviction statistics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Query cache is not initialized")]
    NotInitialized,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid cache configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
