//! Cache invalidation entry points.
//!
//! Writers call into [`CacheInvalidator`] after an entry changes; it expands
//! the change into the tags that can reference the entry and purges them.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::keys::{EntityKey, build_name};
use super::store::CacheBackend;

#[derive(Clone)]
pub struct CacheInvalidator {
    enabled: bool,
    backend: Arc<dyn CacheBackend>,
}

impl CacheInvalidator {
    pub fn new(enabled: bool, backend: Arc<dyn CacheBackend>) -> Self {
        Self { enabled, backend }
    }

    /// Purge everything that may render the given entry.
    pub fn entry_changed(&self, entry_id: Uuid) -> usize {
        let tags = [
            EntityKey::BlogEntry(entry_id).tag(),
            build_name(&entry_id.to_string()),
            EntityKey::BlogIndex.tag(),
            EntityKey::Feed.tag(),
            EntityKey::Sitemap.tag(),
        ];
        let removed = self.invalidate_tags(&tags);
        info!(entry_id = %entry_id, removed, "blog entry invalidated");
        removed
    }

    pub fn invalidate_tags(&self, tags: &[String]) -> usize {
        if !self.enabled {
            debug!(?tags, "invalidation skipped: cache disabled");
            return 0;
        }
        self.backend.invalidate_tags(tags)
    }

    pub fn clear_all(&self) {
        self.backend.clear();
        info!("blog cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use bytes::Bytes;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::{CacheItem, MemoryTagCache};

    async fn seed(cache: &MemoryTagCache, key: &str, tags: &[String]) {
        let item = CacheItem {
            value: Bytes::from_static(b"v"),
            tags: tags.iter().cloned().collect::<BTreeSet<_>>(),
            cacheable: true,
        };
        cache
            .get(key, Box::pin(async move { Ok::<_, crate::cache::CacheError>(item) }))
            .await
            .expect("seed");
    }

    #[tokio::test]
    async fn entry_changed_purges_detail_and_listings() {
        let backend = Arc::new(MemoryTagCache::new(&CacheConfig::default()));
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();

        seed(&backend, "detail", &[build_name(&id.to_string())]).await;
        seed(&backend, "search", &[EntityKey::BlogIndex.tag()]).await;
        seed(&backend, "other", &[build_name(&other.to_string())]).await;

        let invalidator = CacheInvalidator::new(true, backend.clone());
        assert_eq!(invalidator.entry_changed(id), 2);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn disabled_invalidator_is_a_no_op() {
        let backend = Arc::new(MemoryTagCache::new(&CacheConfig::default()));
        seed(&backend, "k", &["t".to_string()]).await;

        let invalidator = CacheInvalidator::new(false, backend.clone());
        assert_eq!(invalidator.invalidate_tags(&["t".to_string()]), 0);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn clear_all_empties_backend() {
        let backend = Arc::new(MemoryTagCache::new(&CacheConfig::default()));
        seed(&backend, "k", &["t".to_string()]).await;

        CacheInvalidator::new(true, backend.clone()).clear_all();
        assert!(backend.is_empty());
    }
}
