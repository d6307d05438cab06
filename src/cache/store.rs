//! Tag-aware cache backends.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use lru::LruCache;
use metrics::counter;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::CacheError;
use super::config::CacheConfig;
use super::lock::rw_write;
use super::registry::TagRegistry;

const SOURCE: &str = "cache::store";

/// Value produced by a populate callback.
#[derive(Debug, Clone)]
pub struct CacheItem {
    pub value: Bytes,
    pub tags: BTreeSet<String>,
    /// `false` hands the value back without storing it.
    pub cacheable: bool,
}

impl CacheItem {
    /// Placeholder for a response handed back outside the cache.
    pub fn uncacheable() -> Self {
        Self {
            value: Bytes::new(),
            tags: BTreeSet::new(),
            cacheable: false,
        }
    }
}

pub type PopulateFuture<'a> = BoxFuture<'a, Result<CacheItem, CacheError>>;

/// Cache backend with populate-on-miss reads and invalidation by tag.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Return the value under `key`, running `populate` on a miss.
    ///
    /// Concurrent misses on one key run `populate` once; later callers
    /// observe the stored value.
    async fn get(&self, key: &str, populate: PopulateFuture<'_>) -> Result<Bytes, CacheError>;

    /// Drop every entry tagged with any of `tags`; returns the number dropped.
    fn invalidate_tags(&self, tags: &[String]) -> usize;

    fn clear(&self);
}

/// In-process LRU backend.
///
/// Lock order is `entries` then the tag registry. Every purge bumps
/// `generation` under the `entries` lock; a populate that saw an older
/// generation hands its value back without storing it.
pub struct MemoryTagCache {
    entries: RwLock<LruCache<String, Bytes>>,
    registry: TagRegistry,
    generation: AtomicU64,
    populating: DashMap<String, Arc<Mutex<()>>>,
}

impl MemoryTagCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            registry: TagRegistry::new(),
            generation: AtomicU64::new(0),
            populating: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        rw_write(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tags_for_key(&self, key: &str) -> BTreeSet<String> {
        self.registry.tags_for_key(key).into_iter().collect()
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        rw_write(&self.entries, SOURCE, "lookup").get(key).cloned()
    }

    /// Store `item` unless a purge ran since `generation` was read.
    fn store(&self, key: &str, item: &CacheItem, generation: u64) {
        let mut entries = rw_write(&self.entries, SOURCE, "store");
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(cache = "detail", key, "purged while populating; not stored");
            return;
        }

        let evicted = entries
            .push(key.to_string(), item.value.clone())
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| evicted_key != key);

        if let Some(evicted_key) = evicted {
            debug!(cache = "detail", key = %evicted_key, "evicted by capacity");
            self.registry.unregister(&evicted_key);
        }
        self.registry.register(key, item.tags.iter().cloned());
        counter!("sas_blog_cache_detail_store_total").increment(1);
    }

    fn release_gate(&self, key: &str, gate: &Arc<Mutex<()>>) {
        // the map and `gate` hold two references; more means someone is waiting
        self.populating
            .remove_if(key, |_, held| Arc::ptr_eq(held, gate) && Arc::strong_count(held) <= 2);
    }
}

/// Holds the per-key population lock and gives the gate back on drop, also
/// when the request future is cancelled mid-populate.
struct PopulateGate<'a> {
    cache: &'a MemoryTagCache,
    key: &'a str,
    gate: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> PopulateGate<'a> {
    async fn acquire(cache: &'a MemoryTagCache, key: &'a str) -> PopulateGate<'a> {
        let gate = cache.populating.entry(key.to_string()).or_default().clone();
        let mut held = PopulateGate {
            cache,
            key,
            gate,
            guard: None,
        };
        held.guard = Some(Arc::clone(&held.gate).lock_owned().await);
        held
    }
}

impl Drop for PopulateGate<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.cache.release_gate(self.key, &self.gate);
    }
}

#[async_trait]
impl CacheBackend for MemoryTagCache {
    async fn get(&self, key: &str, populate: PopulateFuture<'_>) -> Result<Bytes, CacheError> {
        if let Some(value) = self.lookup(key) {
            counter!("sas_blog_cache_detail_hit_total").increment(1);
            debug!(cache = "detail", outcome = "hit", key, "serving cached value");
            return Ok(value);
        }

        let _gate = PopulateGate::acquire(self, key).await;

        if let Some(value) = self.lookup(key) {
            counter!("sas_blog_cache_detail_hit_total").increment(1);
            debug!(cache = "detail", outcome = "hit", key, "populated while waiting");
            return Ok(value);
        }

        counter!("sas_blog_cache_detail_miss_total").increment(1);
        debug!(cache = "detail", outcome = "miss", key, "populating");

        let generation = self.generation.load(Ordering::Acquire);
        let item = populate.await?;
        if item.cacheable {
            self.store(key, &item, generation);
        }
        Ok(item.value)
    }

    fn invalidate_tags(&self, tags: &[String]) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate_tags");
        self.generation.fetch_add(1, Ordering::AcqRel);
        let keys = self
            .registry
            .take_keys_for_tags(tags.iter().map(String::as_str));
        let removed = keys
            .iter()
            .filter(|key| entries.pop(key.as_str()).is_some())
            .count();
        counter!("sas_blog_cache_invalidated_total").increment(removed as u64);
        removed
    }

    fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
        self.registry.clear();
    }
}
