//! Cache key and tag derivation.
//!
//! Detail responses are stored under `blog-detail-{id}-{digest}` where the
//! digest covers the storefront context hash, and are tagged with
//! `blog-detail-{id}` plus whatever entity tags were traced while rendering.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::application::context::StorefrontContext;

const DETAIL_PREFIX: &str = "blog-detail-";

/// Entities whose change invalidates cached responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// A single blog entry by id.
    BlogEntry(Uuid),
    /// Listings and searches over all entries.
    BlogIndex,
    /// The RSS feed.
    Feed,
    /// The sitemap.
    Sitemap,
}

impl EntityKey {
    /// Tag string recorded on cache entries depending on this entity.
    pub fn tag(&self) -> String {
        match self {
            EntityKey::BlogEntry(id) => format!("sas-blog-entry-{id}"),
            EntityKey::BlogIndex => "sas-blog-index".to_string(),
            EntityKey::Feed => "sas-blog-feed".to_string(),
            EntityKey::Sitemap => "sas-blog-sitemap".to_string(),
        }
    }
}

/// Name shared by every cached variant of one article's detail page.
pub fn build_name(article_id: &str) -> String {
    format!("{DETAIL_PREFIX}{article_id}")
}

/// Cache key for one article rendered under one storefront context.
pub fn generate_key(article_id: &str, context: &StorefrontContext) -> String {
    let parts = [context.context_hash()];
    // a JSON array of strings cannot fail to serialize
    let encoded = serde_json::to_string(&parts).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    format!("{}-{}", build_name(article_id), hex::encode(hasher.finalize()))
}

/// Traced tags plus the article's own name, blanks dropped and deduplicated.
pub fn generate_tags<I>(article_id: &str, traced: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = String>,
{
    traced
        .into_iter()
        .chain(std::iter::once(build_name(article_id)))
        .filter(|tag| !tag.trim().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(language: &str) -> StorefrontContext {
        StorefrontContext {
            language_id: language.to_string(),
            ..StorefrontContext::default()
        }
    }

    #[test]
    fn key_is_deterministic() {
        let ctx = context("en");
        assert_eq!(generate_key("abc", &ctx), generate_key("abc", &ctx.clone()));
    }

    #[test]
    fn key_starts_with_detail_name() {
        let key = generate_key("abc", &context("en"));
        assert!(key.starts_with("blog-detail-abc-"));
        // sha256 hex digest
        assert_eq!(key.len(), "blog-detail-abc-".len() + 64);
    }

    #[test]
    fn key_differs_per_article_and_context() {
        let en = context("en");
        let de = context("de");

        assert_ne!(generate_key("abc", &en), generate_key("abd", &en));
        assert_ne!(generate_key("abc", &en), generate_key("abc", &de));
    }

    #[test]
    fn tags_include_own_name_and_drop_blanks() {
        let tags = generate_tags(
            "abc",
            vec![
                "sas-blog-entry-abc".to_string(),
                String::new(),
                "blog-detail-abc".to_string(),
            ],
        );

        assert_eq!(tags.len(), 2);
        assert!(tags.contains("blog-detail-abc"));
        assert!(tags.contains("sas-blog-entry-abc"));
    }

    #[test]
    fn entity_tags_are_distinct() {
        let id = Uuid::nil();
        let tags: BTreeSet<String> = [
            EntityKey::BlogEntry(id),
            EntityKey::BlogIndex,
            EntityKey::Feed,
            EntityKey::Sitemap,
        ]
        .iter()
        .map(EntityKey::tag)
        .collect();
        assert_eq!(tags.len(), 4);
    }
}
