//! In-process blog store used when no database is configured, and by tests.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::criteria::{Association, Criteria, EntitySearchResult, TotalCountMode};
use crate::application::repos::{BlogRepo, RepoError, SeoUrlsRepo};
use crate::domain::entities::{
    AuthorRecord, BlogEntry, BlogEntryRecord, CategoryRecord, SeoUrlRecord,
};

const SEO_PATH_CONSTRAINT: &str = "sas_blog_seo_urls_route_path_key";

#[derive(Default)]
struct State {
    authors: HashMap<Uuid, AuthorRecord>,
    categories: HashMap<Uuid, CategoryRecord>,
    entries: Vec<BlogEntryRecord>,
    entry_categories: HashMap<Uuid, Vec<Uuid>>,
    seo_urls: Vec<SeoUrlRecord>,
}

impl State {
    fn load(&self, record: &BlogEntryRecord, criteria: &Criteria) -> BlogEntry {
        let mut entry = BlogEntry::new(record.clone());
        if criteria.has_association(Association::Author) {
            entry.author = record
                .author_id
                .and_then(|id| self.authors.get(&id))
                .cloned();
        }
        if criteria.has_association(Association::Categories) {
            let mut categories: Vec<CategoryRecord> = self
                .entry_categories
                .get(&record.id)
                .into_iter()
                .flatten()
                .filter_map(|id| self.categories.get(id))
                .cloned()
                .collect();
            categories.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
            entry.categories = categories;
        }
        entry
    }
}

/// Newest publication first, unpublished last, ties by id.
fn listing_order(a: &BlogEntryRecord, b: &BlogEntryRecord) -> Ordering {
    match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

#[derive(Default)]
pub struct MemoryBlogStore {
    state: RwLock<State>,
}

impl MemoryBlogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_author(&self, author: AuthorRecord) {
        self.state.write().await.authors.insert(author.id, author);
    }

    pub async fn insert_category(&self, category: CategoryRecord) {
        self.state
            .write()
            .await
            .categories
            .insert(category.id, category);
    }

    /// Insert or replace an entry together with its category links.
    pub async fn upsert_entry(&self, record: BlogEntryRecord, category_ids: &[Uuid]) {
        let mut state = self.state.write().await;
        state
            .entry_categories
            .insert(record.id, category_ids.to_vec());
        match state.entries.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => state.entries.push(record),
        }
    }

    pub async fn seo_urls(&self) -> Vec<SeoUrlRecord> {
        self.state.read().await.seo_urls.clone()
    }
}

#[async_trait]
impl BlogRepo for MemoryBlogStore {
    async fn search(&self, criteria: &Criteria) -> Result<EntitySearchResult<BlogEntry>, RepoError> {
        let state = self.state.read().await;

        let mut matching: Vec<&BlogEntryRecord> = state
            .entries
            .iter()
            .filter(|record| criteria.matches(&BlogEntry::new((*record).clone())))
            .collect();
        matching.sort_by(|a, b| listing_order(a, b));

        let offset = usize::try_from(criteria.offset).unwrap_or(usize::MAX);
        let limit = criteria
            .limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        let items: Vec<BlogEntry> = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|record| state.load(record, criteria))
            .collect();

        let matched = matching.len() as u64;
        let total = match criteria.total_count_mode {
            TotalCountMode::None => items.len() as u64,
            TotalCountMode::Exact => matched,
            TotalCountMode::NextPages => criteria
                .next_pages_cap()
                .map_or(matched, |cap| matched.min(cap)),
        };

        Ok(EntitySearchResult {
            items,
            total,
            limit: criteria.limit,
            offset: criteria.offset,
        })
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait]
impl SeoUrlsRepo for MemoryBlogStore {
    async fn upsert_canonical(&self, url: &SeoUrlRecord) -> Result<(), RepoError> {
        let mut state = self.state.write().await;

        let taken = state.seo_urls.iter().any(|existing| {
            existing.route_name == url.route_name
                && existing.seo_path_info == url.seo_path_info
                && existing.entry_id != url.entry_id
        });
        if taken {
            return Err(RepoError::Duplicate {
                constraint: SEO_PATH_CONSTRAINT.to_string(),
            });
        }

        let mut found = false;
        for existing in state
            .seo_urls
            .iter_mut()
            .filter(|existing| existing.entry_id == url.entry_id && existing.route_name == url.route_name)
        {
            if existing.seo_path_info == url.seo_path_info {
                existing.path_info = url.path_info.clone();
                existing.is_canonical = true;
                existing.updated_at = url.updated_at;
                found = true;
            } else {
                existing.is_canonical = false;
            }
        }
        if !found {
            state.seo_urls.push(SeoUrlRecord {
                is_canonical: true,
                ..url.clone()
            });
        }
        Ok(())
    }

    async fn find_by_seo_path(
        &self,
        route_name: &str,
        seo_path_info: &str,
    ) -> Result<Option<SeoUrlRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .seo_urls
            .iter()
            .find(|url| url.route_name == route_name && url.seo_path_info == seo_path_info)
            .cloned())
    }

    async fn find_canonical_for_entries(
        &self,
        route_name: &str,
        entry_ids: &[Uuid],
    ) -> Result<Vec<SeoUrlRecord>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .seo_urls
            .iter()
            .filter(|url| {
                url.is_canonical && url.route_name == route_name && entry_ids.contains(&url.entry_id)
            })
            .cloned()
            .collect())
    }
}
