//! Cache keys

use std::fmt;
use std::sync::Arc;

/// Opaque fingerprint addressing a cache entry.
///
/// Keys are produced by the planner from a fragment's plan digest and its
/// inputs. Cloning is a reference-count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<[u8]>);

impl CacheKey {
    /// Create a key from raw fingerprint bytes
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    /// Create a key for one tablet of a fragment: the plan digest followed by
    /// the tablet id, so each tablet's partial result is cached separately.
    pub fn for_tablet(digest: impl AsRef<[u8]>, tablet_id: i64) -> Self {
        let digest = digest.as_ref();
        let mut bytes = Vec::with_capacity(digest.len() + 8);
        bytes.extend_from_slice(digest);
        bytes.extend_from_slice(&tablet_id.to_le_bytes());
        Self(Arc::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s.into_bytes()))
    }
}

impl From<Vec<u8>> for CacheKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&[u8]> for CacheKey {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "CacheKey({:?})", s),
            Err(_) => write!(f, "CacheKey({} bytes)", self.0.len()),
        }
    }
}
