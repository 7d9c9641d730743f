pub mod cached_executor;

pub use cached_executor::{CacheProbe, CachedFragmentExecutor, FragmentResult, FragmentSource};
