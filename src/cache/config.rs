//! Cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_DETAIL_CAPACITY: usize = 1024;
const DEFAULT_COMPRESSION_LEVEL: i32 = 3;
const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Detail-page cache configuration, the `[cache]` table of `sas-blog.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Wrap the detail handler with the response cache.
    pub enabled: bool,
    /// Maximum number of cached detail responses.
    pub capacity: usize,
    /// zstd level used for stored responses.
    pub compression_level: i32,
    /// Responses with larger bodies are served but not stored.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_DETAIL_CAPACITY,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl CacheConfig {
    /// Capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
