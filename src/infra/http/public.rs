use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use uuid::Uuid;

use crate::{
    application::{
        cms::CmsSlotResolver,
        context::StorefrontContext,
        error::HttpError,
        feed::{BlogFeedService, FeedChannel},
        page::BlogPageLoader,
        repos::{BlogRepo, RepoError, SeoUrlsRepo},
        search::{
            BlogSearchPage, BlogSearchPageLoader, DEFAULT_LIMIT, SearchForm, SearchParams,
            SearchRequest,
        },
        seo::{ROUTE_NAME, SeoUrlResolver},
        sitemap::BlogUrlProvider,
    },
    cache::{CacheBackend, CacheConfig, CachedBlogDetail, DetailHandler},
    config::SiteSettings,
    domain::entities::BlogEntry,
    presentation::views::{
        HomeTemplate, HomeView, LayoutContext, PageMetaView, SearchPageletTemplate,
        SearchResultsView, SearchTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    context::Storefront,
    detail::BlogDetailHandler,
    middleware::{log_responses, set_request_context},
};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const SEARCH_PATH: &str = "/sas_blog/search";
const PAGELET_PATH: &str = "/widgets/blog-search";
const X_ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");

#[derive(Clone)]
pub struct HttpState {
    pub search: Arc<BlogSearchPageLoader>,
    pub detail: Arc<dyn DetailHandler>,
    pub seo: Arc<SeoUrlResolver>,
    pub seo_urls: Arc<dyn SeoUrlsRepo>,
    pub sitemap: Arc<BlogUrlProvider>,
    pub feed: Arc<BlogFeedService>,
    pub site: SiteSettings,
    pub sitemap_page_size: u64,
}

impl HttpState {
    /// Wire the public services over the given stores. Detail pages are
    /// rendered uncached until [`HttpState::with_detail_cache`] is applied.
    pub fn new(
        blogs: Arc<dyn BlogRepo>,
        seo_urls: Arc<dyn SeoUrlsRepo>,
        site: SiteSettings,
        sitemap_page_size: u64,
    ) -> Self {
        let loader = BlogPageLoader::new(
            blogs.clone(),
            CmsSlotResolver::with_blog_elements(blogs.clone()),
        );
        let detail = BlogDetailHandler::new(loader, seo_urls.clone(), site.clone());

        Self {
            search: Arc::new(BlogSearchPageLoader::new(blogs.clone())),
            detail: Arc::new(detail),
            seo: Arc::new(SeoUrlResolver::new(seo_urls.clone())),
            sitemap: Arc::new(BlogUrlProvider::new(blogs.clone(), seo_urls.clone())),
            feed: Arc::new(BlogFeedService::new(blogs, seo_urls.clone())),
            seo_urls,
            site,
            sitemap_page_size,
        }
    }

    /// Serve detail pages through the response cache.
    pub fn with_detail_cache(self, backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        let detail = CachedBlogDetail::new(self.detail.clone(), backend, config);
        Self {
            detail: Arc::new(detail),
            ..self
        }
    }

    async fn entry_links(&self, entries: &[BlogEntry]) -> Result<HashMap<Uuid, String>, RepoError> {
        let ids: Vec<Uuid> = entries.iter().map(BlogEntry::id).collect();
        Ok(self
            .seo_urls
            .find_canonical_for_entries(ROUTE_NAME, &ids)
            .await?
            .into_iter()
            .map(|url| (url.entry_id, url.seo_path_info))
            .collect())
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(home))
        .route(SEARCH_PATH, get(search_page))
        .route(PAGELET_PATH, get(search_pagelet).post(search_pagelet_form))
        .route("/sas_blog/{article_id}", get(blog_detail))
        .route("/blog/rss", get(rss_feed))
        .route("/blog/{*seo_path}", get(seo_detail))
        .route("/sitemap.xml", get(sitemap))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn home(State(state): State<HttpState>) -> Response {
    let latest = match state.search.load_latest(DEFAULT_LIMIT).await {
        Ok(latest) => latest,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let links = match state.entry_links(&latest.items).await {
        Ok(links) => links,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let meta = PageMetaView::new(&state.site, "Blog", "/");
    let view = LayoutContext::new(meta, &state.site, HomeView::new(&latest, &links));
    render_template_response(HomeTemplate { view }, StatusCode::OK)
}

async fn search_page(
    State(state): State<HttpState>,
    Storefront(context): Storefront,
    Query(params): Query<SearchParams>,
) -> Response {
    if params.search.is_none() {
        return home(State(state)).await;
    }

    let request = SearchRequest::get(params);
    let page = match state.search.load(&request, &context).await {
        Ok(page) => page,
        Err(err) => return HttpError::from(err).into_response(),
    };
    let results = match search_results(&state, &page, SEARCH_PATH).await {
        Ok(results) => results,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let meta = PageMetaView::new(&state.site, "Search", SEARCH_PATH).with_robots(page.robots);
    let view = LayoutContext::new(meta, &state.site, ());
    render_template_response(SearchTemplate { view, results }, StatusCode::OK)
}

async fn search_pagelet(
    State(state): State<HttpState>,
    Storefront(context): Storefront,
    Query(params): Query<SearchParams>,
) -> Response {
    render_pagelet(&state, SearchRequest::get(params), &context).await
}

async fn search_pagelet_form(
    State(state): State<HttpState>,
    Storefront(context): Storefront,
    Query(params): Query<SearchParams>,
    Form(form): Form<SearchForm>,
) -> Response {
    render_pagelet(&state, SearchRequest::post(params, form), &context).await
}

async fn render_pagelet(
    state: &HttpState,
    request: SearchRequest,
    context: &StorefrontContext,
) -> Response {
    let request = request.without_aggregations();
    let mut response = match state.search.load(&request, context).await {
        Ok(page) => match search_results(state, &page, PAGELET_PATH).await {
            Ok(results) => {
                render_template_response(SearchPageletTemplate { results }, StatusCode::OK)
            }
            Err(err) => HttpError::from(err).into_response(),
        },
        Err(err) => HttpError::from(err).into_response(),
    };

    response
        .headers_mut()
        .insert(X_ROBOTS_TAG, HeaderValue::from_static("noindex"));
    response
}

async fn search_results(
    state: &HttpState,
    page: &BlogSearchPage,
    base_path: &str,
) -> Result<SearchResultsView, RepoError> {
    let links = state.entry_links(&page.listing.items).await?;
    Ok(SearchResultsView::new(page, &links, base_path))
}

async fn blog_detail(
    State(state): State<HttpState>,
    Storefront(context): Storefront,
    Path(article_id): Path<String>,
) -> Response {
    state.detail.detail(&article_id, &context).await
}

async fn seo_detail(
    State(state): State<HttpState>,
    Storefront(context): Storefront,
    Path(seo_path): Path<String>,
) -> Response {
    match state.seo.resolve(&format!("blog/{seo_path}")).await {
        Ok(Some(id)) => state.detail.detail(&id.to_string(), &context).await,
        Ok(None) => render_not_found_response(&state.site),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn rss_feed(State(state): State<HttpState>) -> Response {
    let channel = FeedChannel {
        public_url: state.site.public_url.clone(),
        title: state.site.title.clone(),
        description: state.site.description.clone(),
    };

    match state.feed.rss(&channel).await {
        Ok(xml) => xml_response(xml),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn sitemap(State(state): State<HttpState>, Storefront(context): Storefront) -> Response {
    match state
        .sitemap
        .sitemap_xml(&state.site.public_url, &context, state.sitemap_page_size)
        .await
    {
        Ok(xml) => xml_response(xml),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(&state.site)
}

fn xml_response(xml: String) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE))],
        xml,
    )
        .into_response()
}
