//! Bidirectional tag registry.
//!
//! Tracks which cache keys carry which tags so a purge by tag finds every
//! affected entry, and an evicted entry can drop its tag mappings.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

#[derive(Default)]
struct Mappings {
    tag_to_keys: HashMap<String, HashSet<String>>,
    key_to_tags: HashMap<String, HashSet<String>>,
}

/// Tag → keys and key → tags mappings behind a single lock.
#[derive(Default)]
pub struct TagRegistry {
    inner: RwLock<Mappings>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tag set of `key`.
    pub fn register<I>(&self, key: &str, tags: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut inner = rw_write(&self.inner, SOURCE, "register");
        Self::detach(&mut inner, key);

        let tags: HashSet<String> = tags.into_iter().collect();
        for tag in &tags {
            inner
                .tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        inner.key_to_tags.insert(key.to_string(), tags);
    }

    /// Forget `key` and clean up its tag mappings.
    pub fn unregister(&self, key: &str) {
        let mut inner = rw_write(&self.inner, SOURCE, "unregister");
        Self::detach(&mut inner, key);
    }

    /// Remove every key carrying any of `tags` and return those keys.
    pub fn take_keys_for_tags<'a, I>(&self, tags: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut inner = rw_write(&self.inner, SOURCE, "take_keys_for_tags");
        let mut affected = HashSet::new();
        for tag in tags {
            if let Some(keys) = inner.tag_to_keys.get(tag) {
                affected.extend(keys.iter().cloned());
            }
        }
        for key in &affected {
            Self::detach(&mut inner, key);
        }
        affected
    }

    pub fn tags_for_key(&self, key: &str) -> HashSet<String> {
        rw_read(&self.inner, SOURCE, "tags_for_key")
            .key_to_tags
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        let mut inner = rw_write(&self.inner, SOURCE, "clear");
        inner.tag_to_keys.clear();
        inner.key_to_tags.clear();
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.inner, SOURCE, "key_count").key_to_tags.len()
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.inner, SOURCE, "tag_count").tag_to_keys.len()
    }

    fn detach(inner: &mut Mappings, key: &str) {
        let Some(tags) = inner.key_to_tags.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(keys) = inner.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    inner.tag_to_keys.remove(&tag);
                }
            }
        }
    }
}
