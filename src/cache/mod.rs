//! Blog detail response cache.
//!
//! The detail page of an article is rendered once per storefront context and
//! kept compressed in a [`CacheBackend`]. Every entry carries invalidation
//! tags: the entity tags recorded while rendering (see [`tracer`]) plus the
//! detail name of the article.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//! compression_level = 3
//! max_body_bytes = 4194304
//! ```

mod codec;
mod config;
mod detail;
mod invalidator;
mod keys;
mod lock;
mod registry;
mod store;
pub mod tracer;

use thiserror::Error;

pub use codec::CachedResponse;
pub use config::CacheConfig;
pub use detail::{CachedBlogDetail, DetailHandler};
pub use invalidator::CacheInvalidator;
pub use keys::{EntityKey, build_name, generate_key, generate_tags};
pub use store::{CacheBackend, CacheItem, MemoryTagCache, PopulateFuture};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache compression failed: {0}")]
    Compression(#[from] std::io::Error),
    #[error("cache header encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("cached value is corrupt: {0}")]
    Corrupt(String),
    #[error("response body could not be buffered: {0}")]
    Body(String),
}
