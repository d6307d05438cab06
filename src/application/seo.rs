//! SEO url mapping for blog entries.
//!
//! Entries are published under `blog/{first category}/{title}`, both segments
//! lower-cased and slugified. The generated path is stored as the entry's
//! canonical url and resolved back to the entry id on request.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::application::criteria::{Association, Criteria, TotalCountMode};
use crate::application::repos::{BlogRepo, RepoError, SeoUrlsRepo};
use crate::domain::entities::{BlogEntry, SeoUrlRecord};
use crate::domain::slug::derive_slug;

pub const ROUTE_NAME: &str = "sas.frontend.blog.detail";
pub const SEO_TEMPLATE: &str = "blog/{first category name|lower}/{title|lower}";
pub const FALLBACK_CATEGORY: &str = "uncategorized";
const SEO_ROOT: &str = "blog";
const INDEX_PAGE_SIZE: u64 = 200;

#[derive(Debug, Error)]
pub enum SeoError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Entities offered to SEO routes. Only blog entries are routable here.
#[derive(Debug, Clone)]
pub enum RoutableEntity {
    BlogEntry(BlogEntry),
    Other { entity_name: String, id: Uuid },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeoUrlRouteConfig {
    pub entity_name: &'static str,
    pub route_name: &'static str,
    pub template: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeoUrlMapping {
    pub entry: BlogEntry,
    /// Route parameters of the technical url.
    pub info_path_context: BTreeMap<String, String>,
    pub path_info: String,
    pub seo_path_info: String,
}

/// Path of the technical detail route for an entry.
pub fn path_info(entry_id: Uuid) -> String {
    format!("/sas_blog/{entry_id}")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BlogSeoUrlRoute;

impl BlogSeoUrlRoute {
    pub fn config(&self) -> SeoUrlRouteConfig {
        SeoUrlRouteConfig {
            entity_name: "sas_blog_entries",
            route_name: ROUTE_NAME,
            template: SEO_TEMPLATE,
        }
    }

    pub fn prepare_criteria(&self, criteria: &mut Criteria) {
        criteria.add_associations(&[Association::Categories, Association::Author]);
    }

    pub fn get_mapping(&self, entity: &RoutableEntity) -> Result<SeoUrlMapping, SeoError> {
        let RoutableEntity::BlogEntry(entry) = entity else {
            return Err(SeoError::InvalidArgument(
                "expected a blog entry".to_string(),
            ));
        };

        let id = entry.id();
        Ok(SeoUrlMapping {
            entry: entry.clone(),
            info_path_context: BTreeMap::from([("articleId".to_string(), id.to_string())]),
            path_info: path_info(id),
            seo_path_info: self.seo_path(entry),
        })
    }

    /// Render the SEO path of an entry. Categories must be loaded.
    pub fn seo_path(&self, entry: &BlogEntry) -> String {
        let category = entry
            .first_category()
            .and_then(|category| derive_slug(&category.name.to_lowercase()).ok())
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());

        let title = derive_slug(&entry.record.title.to_lowercase())
            .or_else(|_| derive_slug(&entry.record.slug))
            .unwrap_or_else(|_| entry.id().to_string());

        format!("{SEO_ROOT}/{category}/{title}")
    }
}

/// Reverse lookup from SEO path to entry id.
#[derive(Clone)]
pub struct SeoUrlResolver {
    seo_urls: Arc<dyn SeoUrlsRepo>,
}

impl SeoUrlResolver {
    pub fn new(seo_urls: Arc<dyn SeoUrlsRepo>) -> Self {
        Self { seo_urls }
    }

    pub async fn resolve(&self, path: &str) -> Result<Option<Uuid>, SeoError> {
        let normalized = path.trim().trim_matches('/');
        if normalized.is_empty() {
            return Ok(None);
        }

        let found = self
            .seo_urls
            .find_by_seo_path(ROUTE_NAME, normalized)
            .await?;
        Ok(found.map(|url| url.entry_id))
    }
}

/// Regenerates canonical SEO urls for every entry.
#[derive(Clone)]
pub struct SeoUrlIndexer {
    blogs: Arc<dyn BlogRepo>,
    seo_urls: Arc<dyn SeoUrlsRepo>,
    route: BlogSeoUrlRoute,
}

impl SeoUrlIndexer {
    pub fn new(blogs: Arc<dyn BlogRepo>, seo_urls: Arc<dyn SeoUrlsRepo>) -> Self {
        Self {
            blogs,
            seo_urls,
            route: BlogSeoUrlRoute,
        }
    }

    /// Returns the number of urls written.
    #[instrument(skip_all)]
    pub async fn reindex_all(&self) -> Result<usize, SeoError> {
        let mut written = 0;
        let mut offset = 0;

        loop {
            let mut criteria = Criteria::new();
            criteria.limit = Some(INDEX_PAGE_SIZE);
            criteria.offset = offset;
            criteria.total_count_mode = TotalCountMode::None;
            criteria.title = Some("blog-seo-index".to_string());
            self.route.prepare_criteria(&mut criteria);

            let page = self.blogs.search(&criteria).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len() as u64;

            for entry in page.items {
                let mapping = self.route.get_mapping(&RoutableEntity::BlogEntry(entry))?;
                self.write(&mapping).await?;
                written += 1;
            }
        }

        info!(written, "seo urls reindexed");
        Ok(written)
    }

    async fn write(&self, mapping: &SeoUrlMapping) -> Result<(), SeoError> {
        let id = mapping.entry.id();
        let mut record = SeoUrlRecord {
            entry_id: id,
            route_name: ROUTE_NAME.to_string(),
            path_info: mapping.path_info.clone(),
            seo_path_info: mapping.seo_path_info.clone(),
            is_canonical: true,
            updated_at: OffsetDateTime::now_utc(),
        };

        match self.seo_urls.upsert_canonical(&record).await {
            Err(RepoError::Duplicate { .. }) => {
                // two entries rendered to the same path; disambiguate with the id
                record.seo_path_info = format!("{}-{}", mapping.seo_path_info, id.simple());
                warn!(entry_id = %id, seo_path = %record.seo_path_info, "seo path collision");
                self.seo_urls.upsert_canonical(&record).await?;
                Ok(())
            }
            other => other.map_err(SeoError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::{BlogEntryRecord, CategoryRecord};
    use crate::infra::memory::MemoryBlogStore;

    fn entry(title: &str, categories: &[(&str, i32)]) -> BlogEntry {
        let mut entry = BlogEntry::new(BlogEntryRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: "fallback-slug".to_string(),
            teaser: String::new(),
            body: String::new(),
            author_id: None,
            published_at: Some(datetime!(2024-01-01 0:00 UTC)),
            active: true,
            media_id: None,
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: None,
        });
        entry.categories = categories
            .iter()
            .map(|(name, position)| CategoryRecord {
                id: Uuid::new_v4(),
                name: name.to_string(),
                position: *position,
            })
            .collect();
        entry
    }

    #[test]
    fn path_uses_first_category_and_title() {
        let entry = entry("Hello World", &[("Zeta", 2), ("Product News", 1)]);
        assert_eq!(BlogSeoUrlRoute.seo_path(&entry), "blog/product-news/hello-world");
    }

    #[test]
    fn missing_category_uses_fallback_segment() {
        let entry = entry("Hello World", &[]);
        assert_eq!(BlogSeoUrlRoute.seo_path(&entry), "blog/uncategorized/hello-world");
    }

    #[test]
    fn unsluggable_title_falls_back_to_entry_slug() {
        let entry = entry("!!!", &[("News", 0)]);
        assert_eq!(BlogSeoUrlRoute.seo_path(&entry), "blog/news/fallback-slug");
    }

    #[test]
    fn mapping_carries_article_id_context() {
        let entry = entry("Hello", &[]);
        let id = entry.id();
        let mapping = BlogSeoUrlRoute
            .get_mapping(&RoutableEntity::BlogEntry(entry))
            .expect("mapping");
        assert_eq!(mapping.info_path_context["articleId"], id.to_string());
        assert_eq!(mapping.path_info, format!("/sas_blog/{id}"));
    }

    #[test]
    fn mapping_rejects_other_entities() {
        let result = BlogSeoUrlRoute.get_mapping(&RoutableEntity::Other {
            entity_name: "product".to_string(),
            id: Uuid::new_v4(),
        });
        assert!(matches!(result, Err(SeoError::InvalidArgument(_))));
    }

    #[test]
    fn prepare_criteria_adds_associations() {
        let mut criteria = Criteria::new();
        BlogSeoUrlRoute.prepare_criteria(&mut criteria);
        assert!(criteria.has_association(Association::Categories));
        assert!(criteria.has_association(Association::Author));
    }

    #[tokio::test]
    async fn reindex_then_resolve_round_trip() {
        let store = Arc::new(MemoryBlogStore::new());
        let category = CategoryRecord {
            id: Uuid::new_v4(),
            name: "News".to_string(),
            position: 0,
        };
        store.insert_category(category.clone()).await;

        let first = entry("Launch Day", &[]);
        let twin = entry("Launch Day", &[]);
        let (first_id, twin_id) = (first.id(), twin.id());
        store.upsert_entry(first.record, &[category.id]).await;
        store.upsert_entry(twin.record, &[category.id]).await;

        let indexer = SeoUrlIndexer::new(store.clone(), store.clone());
        assert_eq!(indexer.reindex_all().await.expect("reindex"), 2);

        let resolver = SeoUrlResolver::new(store.clone());
        let resolved = resolver
            .resolve("/blog/news/launch-day")
            .await
            .expect("resolve")
            .expect("match");
        assert!(resolved == first_id || resolved == twin_id);

        let paths: Vec<String> = store
            .seo_urls()
            .await
            .into_iter()
            .map(|url| url.seo_path_info)
            .collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().any(|path| path.starts_with("blog/news/launch-day-")));

        assert_eq!(resolver.resolve("/blog/news/missing").await.expect("resolve"), None);
        assert_eq!(resolver.resolve("/").await.expect("resolve"), None);
    }
}
