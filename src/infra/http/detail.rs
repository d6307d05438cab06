use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::context::StorefrontContext;
use crate::application::error::HttpError;
use crate::application::page::{BlogPageLoader, PageError};
use crate::application::repos::SeoUrlsRepo;
use crate::application::seo::{ROUTE_NAME, path_info};
use crate::cache::DetailHandler;
use crate::config::SiteSettings;
use crate::presentation::views::{
    DetailTemplate, DetailView, LayoutContext, PageMetaView, render_not_found_response,
    render_template_response,
};

/// Renders blog detail pages; wrapped by the response cache when enabled.
pub struct BlogDetailHandler {
    loader: BlogPageLoader,
    seo_urls: Arc<dyn SeoUrlsRepo>,
    site: SiteSettings,
}

impl BlogDetailHandler {
    pub fn new(loader: BlogPageLoader, seo_urls: Arc<dyn SeoUrlsRepo>, site: SiteSettings) -> Self {
        Self {
            loader,
            seo_urls,
            site,
        }
    }
}

#[async_trait]
impl DetailHandler for BlogDetailHandler {
    async fn detail(&self, article_id: &str, context: &StorefrontContext) -> Response {
        let page = match self.loader.load(article_id, context).await {
            Ok(page) => page,
            Err(PageError::NotFound { .. }) => return render_not_found_response(&self.site),
            Err(err) => return HttpError::from(err).into_response(),
        };

        let id = page.entry.id();
        let canonical = match self
            .seo_urls
            .find_canonical_for_entries(ROUTE_NAME, &[id])
            .await
        {
            Ok(urls) => urls
                .into_iter()
                .next()
                .map(|url| url.seo_path_info)
                .unwrap_or_else(|| path_info(id)),
            Err(err) => return HttpError::from(err).into_response(),
        };

        let content = DetailView::new(&page);
        let meta = PageMetaView::new(&self.site, &content.title, &canonical)
            .with_description(&page.entry.record.teaser);
        let view = LayoutContext::new(meta, &self.site, content);
        render_template_response(DetailTemplate { view }, StatusCode::OK)
    }
}
