//! RSS 2.0 feed of published blog entries.

use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;
use tracing::instrument;
use uuid::Uuid;

use crate::application::criteria::{Association, Criteria, Filter};
use crate::application::repos::{BlogRepo, RepoError, SeoUrlsRepo};
use crate::application::seo::{ROUTE_NAME, path_info};
use crate::application::sitemap::xml_escape;
use crate::cache::{EntityKey, tracer};

/// Channel metadata taken from the site configuration.
#[derive(Debug, Clone)]
pub struct FeedChannel {
    pub public_url: String,
    pub title: String,
    pub description: String,
}

#[derive(Clone)]
pub struct BlogFeedService {
    blogs: Arc<dyn BlogRepo>,
    seo_urls: Arc<dyn SeoUrlsRepo>,
}

impl BlogFeedService {
    pub fn new(blogs: Arc<dyn BlogRepo>, seo_urls: Arc<dyn SeoUrlsRepo>) -> Self {
        Self { blogs, seo_urls }
    }

    #[instrument(skip_all)]
    pub async fn rss(&self, channel: &FeedChannel) -> Result<String, RepoError> {
        tracer::record(EntityKey::Feed);
        tracer::record(EntityKey::BlogIndex);

        let mut criteria = Criteria::new();
        criteria
            .add_filter(Filter::Active(true))
            .add_filter(Filter::PublishedBefore(OffsetDateTime::now_utc()))
            .add_associations(&[Association::Author]);
        let entries = self.blogs.search(&criteria).await?;

        let ids: Vec<Uuid> = entries.items.iter().map(|entry| entry.id()).collect();
        let seo_paths: HashMap<Uuid, String> = self
            .seo_urls
            .find_canonical_for_entries(ROUTE_NAME, &ids)
            .await?
            .into_iter()
            .map(|url| (url.entry_id, url.seo_path_info))
            .collect();

        let base = channel.public_url.trim_end_matches('/');
        let mut items = String::new();
        for entry in entries.items {
            let path = seo_paths
                .get(&entry.id())
                .cloned()
                .unwrap_or_else(|| path_info(entry.id()));
            let link = format!("{base}/{}", path.trim_start_matches('/'));
            let published = entry.record.published_at.unwrap_or(entry.record.created_at);
            let pub_date = published
                .format(&Rfc2822)
                .unwrap_or_else(|_| published.to_string());

            items.push_str("    <item>\n");
            items.push_str(&format!("      <title>{}</title>\n", xml_escape(&entry.record.title)));
            items.push_str(&format!("      <link>{}</link>\n", xml_escape(&link)));
            items.push_str(&format!(
                "      <guid isPermaLink=\"false\">{}</guid>\n",
                entry.id()
            ));
            items.push_str(&format!("      <pubDate>{pub_date}</pubDate>\n"));
            if let Some(author) = entry.author.as_ref() {
                items.push_str(&format!(
                    "      <author>{}</author>\n",
                    xml_escape(&author.display_name())
                ));
            }
            items.push_str(&format!(
                "      <description>{}</description>\n",
                xml_escape(&entry.record.teaser)
            ));
            items.push_str("    </item>\n");
        }

        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n  <channel>\n    <title>{}</title>\n    <link>{}</link>\n    <description>{}</description>\n{}  </channel>\n</rss>\n",
            xml_escape(&channel.title),
            xml_escape(base),
            xml_escape(&channel.description),
            items
        ))
    }
}
