//! Sitemap url provider for published blog entries.
//!
//! Only entries that are active, already published and own a canonical SEO
//! url are listed. The XML rendering turns the stored SEO paths into
//! absolute locations below the public site url.

use std::collections::HashMap;
use std::sync::Arc;

use futures::{Stream, TryStreamExt, stream};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;
use uuid::Uuid;

use crate::application::context::StorefrontContext;
use crate::application::criteria::{Criteria, Filter};
use crate::application::repos::{BlogRepo, RepoError, SeoUrlsRepo};
use crate::application::seo::ROUTE_NAME;
use crate::cache::{EntityKey, tracer};

pub const PROVIDER_NAME: &str = "sasBlog";
pub const CHANGE_FREQ: &str = "weekly";
pub const PRIORITY: f32 = 0.5;
pub const RESOURCE: &str = "sas_blog_entries";

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("failed to list blog entries: {0}")]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    pub loc: String,
    pub lastmod: OffsetDateTime,
    pub changefreq: &'static str,
    pub priority: f32,
    pub resource: &'static str,
    pub identifier: Uuid,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UrlResult {
    pub urls: Vec<SitemapUrl>,
    /// Always `None`; callers advance the offset themselves.
    pub next_offset: Option<u64>,
}

#[derive(Clone)]
pub struct BlogUrlProvider {
    blogs: Arc<dyn BlogRepo>,
    seo_urls: Arc<dyn SeoUrlsRepo>,
}

impl BlogUrlProvider {
    pub fn new(blogs: Arc<dyn BlogRepo>, seo_urls: Arc<dyn SeoUrlsRepo>) -> Self {
        Self { blogs, seo_urls }
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub async fn get_urls(
        &self,
        context: &StorefrontContext,
        limit: u64,
        offset: u64,
    ) -> Result<UrlResult, SitemapError> {
        let (urls, _) = self.fetch_page(context, limit, offset).await?;
        Ok(UrlResult {
            urls,
            next_offset: None,
        })
    }

    /// Every sitemap url, fetched `page_size` entries at a time.
    pub fn stream_urls<'a>(
        &'a self,
        context: &'a StorefrontContext,
        page_size: u64,
    ) -> impl Stream<Item = Result<SitemapUrl, SitemapError>> + Send + 'a {
        let page_size = page_size.max(1);
        stream::try_unfold(Some(0u64), move |offset| async move {
            let Some(offset) = offset else {
                return Ok::<_, SitemapError>(None);
            };
            let (urls, scanned) = self.fetch_page(context, page_size, offset).await?;
            if scanned == 0 {
                return Ok(None);
            }
            let next = (scanned == page_size).then_some(offset + scanned);
            Ok(Some((urls, next)))
        })
        .map_ok(|urls| stream::iter(urls.into_iter().map(Ok::<_, SitemapError>)))
        .try_flatten()
    }

    /// Render a complete `urlset` document with absolute locations.
    #[instrument(skip_all)]
    pub async fn sitemap_xml(
        &self,
        public_url: &str,
        context: &StorefrontContext,
        page_size: u64,
    ) -> Result<String, SitemapError> {
        tracer::record(EntityKey::Sitemap);
        tracer::record(EntityKey::BlogIndex);

        let urls: Vec<SitemapUrl> = self.stream_urls(context, page_size).try_collect().await?;

        let base = public_url.trim_end_matches('/');
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        for url in urls {
            let loc = format!("{base}/{}", url.loc.trim_start_matches('/'));
            let lastmod = url.lastmod.format(&Rfc3339).unwrap_or_default();
            xml.push_str(&format!(
                "  <url><loc>{}</loc><lastmod>{lastmod}</lastmod><changefreq>{}</changefreq><priority>{:.1}</priority></url>\n",
                xml_escape(&loc),
                url.changefreq,
                url.priority,
            ));
        }
        xml.push_str("</urlset>\n");
        Ok(xml)
    }

    /// Urls of one page plus the number of entries the page scanned.
    async fn fetch_page(
        &self,
        _context: &StorefrontContext,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<SitemapUrl>, u64), SitemapError> {
        let now = OffsetDateTime::now_utc();
        let mut criteria = Criteria::new();
        criteria.limit = Some(limit);
        criteria.offset = offset;
        criteria
            .add_filter(Filter::Active(true))
            .add_filter(Filter::PublishedBefore(now));

        let entries = self.blogs.search(&criteria).await?;
        if entries.is_empty() {
            return Ok((Vec::new(), 0));
        }
        let scanned = entries.len() as u64;

        let ids: Vec<Uuid> = entries.items.iter().map(|entry| entry.id()).collect();
        let seo_paths: HashMap<Uuid, String> = self
            .seo_urls
            .find_canonical_for_entries(ROUTE_NAME, &ids)
            .await?
            .into_iter()
            .map(|url| (url.entry_id, url.seo_path_info))
            .collect();

        let urls = entries
            .items
            .into_iter()
            .filter(|entry| entry.is_visible_at(now))
            .filter_map(|entry| {
                let loc = seo_paths.get(&entry.id())?.clone();
                Some(SitemapUrl {
                    loc,
                    lastmod: entry.record.updated_at.unwrap_or(now),
                    changefreq: CHANGE_FREQ,
                    priority: PRIORITY,
                    resource: RESOURCE,
                    identifier: entry.id(),
                })
            })
            .collect();

        Ok((urls, scanned))
    }
}

pub(crate) fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::domain::entities::{BlogEntryRecord, SeoUrlRecord};
    use crate::infra::memory::MemoryBlogStore;

    fn record(title: &str, active: bool, published_at: Option<OffsetDateTime>) -> BlogEntryRecord {
        BlogEntryRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: title.to_lowercase(),
            teaser: String::new(),
            body: String::new(),
            author_id: None,
            published_at,
            active,
            media_id: None,
            created_at: OffsetDateTime::now_utc() - Duration::days(30),
            updated_at: None,
        }
    }

    async fn add(store: &MemoryBlogStore, record: BlogEntryRecord, with_seo: bool) -> Uuid {
        let id = record.id;
        let path = format!("blog/news/{}", record.slug);
        store.upsert_entry(record, &[]).await;
        if with_seo {
            store
                .upsert_canonical(&SeoUrlRecord {
                    entry_id: id,
                    route_name: ROUTE_NAME.to_string(),
                    path_info: format!("/sas_blog/{id}"),
                    seo_path_info: path,
                    is_canonical: true,
                    updated_at: OffsetDateTime::now_utc(),
                })
                .await
                .expect("seo url");
        }
        id
    }

    fn provider(store: &Arc<MemoryBlogStore>) -> BlogUrlProvider {
        BlogUrlProvider::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn never_lists_future_or_inactive_entries() {
        let store = Arc::new(MemoryBlogStore::new());
        let past = OffsetDateTime::now_utc() - Duration::days(1);
        let future = OffsetDateTime::now_utc() + Duration::days(1);

        let visible = add(&store, record("visible", true, Some(past)), true).await;
        add(&store, record("future", true, Some(future)), true).await;
        add(&store, record("inactive", false, Some(past)), true).await;
        add(&store, record("draft", true, None), true).await;

        let result = provider(&store)
            .get_urls(&StorefrontContext::default(), 100, 0)
            .await
            .expect("urls");
        let ids: Vec<Uuid> = result.urls.iter().map(|url| url.identifier).collect();
        assert_eq!(ids, vec![visible]);
        assert_eq!(result.next_offset, None);

        let url = &result.urls[0];
        assert_eq!(url.loc, "blog/news/visible");
        assert_eq!(url.changefreq, "weekly");
        assert_eq!(url.priority, 0.5);
        assert_eq!(url.resource, RESOURCE);
    }

    #[tokio::test]
    async fn entries_without_seo_url_are_skipped() {
        let store = Arc::new(MemoryBlogStore::new());
        let past = OffsetDateTime::now_utc() - Duration::days(1);
        add(&store, record("no-seo", true, Some(past)), false).await;

        let result = provider(&store)
            .get_urls(&StorefrontContext::default(), 10, 0)
            .await
            .expect("urls");
        assert!(result.urls.is_empty());
    }

    #[tokio::test]
    async fn empty_store_is_an_empty_result() {
        let store = Arc::new(MemoryBlogStore::new());
        let result = provider(&store)
            .get_urls(&StorefrontContext::default(), 10, 0)
            .await
            .expect("urls");
        assert_eq!(result, UrlResult::default());
    }

    #[tokio::test]
    async fn stream_walks_every_page() {
        let store = Arc::new(MemoryBlogStore::new());
        for day in 1..=5 {
            let published = OffsetDateTime::now_utc() - Duration::days(day);
            // entry 3 has no seo url, so its page comes back short
            add(&store, record(&format!("post-{day}"), true, Some(published)), day != 3).await;
        }

        let provider = provider(&store);
        let ctx = StorefrontContext::default();
        let urls: Vec<SitemapUrl> = provider
            .stream_urls(&ctx, 2)
            .try_collect()
            .await
            .expect("stream");
        assert_eq!(urls.len(), 4);
    }

    #[tokio::test]
    async fn xml_uses_absolute_locations() {
        let store = Arc::new(MemoryBlogStore::new());
        let past = OffsetDateTime::now_utc() - Duration::days(1);
        add(&store, record("hello", true, Some(past)), true).await;

        let xml = provider(&store)
            .sitemap_xml("https://shop.example/", &StorefrontContext::default(), 50)
            .await
            .expect("xml");
        assert!(xml.contains("<loc>https://shop.example/blog/news/hello</loc>"));
        assert!(xml.contains("<changefreq>weekly</changefreq><priority>0.5</priority>"));
    }
}
