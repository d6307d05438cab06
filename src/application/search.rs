//! Blog search page assembly.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::instrument;

use crate::application::context::StorefrontContext;
use crate::application::criteria::{
    Association, Criteria, EntitySearchResult, Filter, TotalCountMode,
};
use crate::application::repos::{BlogRepo, RepoError};
use crate::cache::{EntityKey, tracer};
use crate::domain::entities::BlogEntry;

pub const DEFAULT_LIMIT: u64 = 24;
pub const DEFAULT_PAGE: u64 = 1;
pub const CRITERIA_TITLE: &str = "blog-search-page";
pub const SEARCH_ROBOTS: &str = "noindex,follow";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("missing request parameter `{0}`")]
    MissingParameter(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Query string of a search request. Numbers stay raw so that garbage
/// falls back to defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
    pub limit: Option<String>,
    pub p: Option<String>,
}

/// Form body of a POSTed pagelet request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchForm {
    pub limit: Option<String>,
    pub p: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: SearchParams,
    pub form: Option<SearchForm>,
    pub no_aggregations: bool,
}

impl SearchRequest {
    pub fn get(query: SearchParams) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn post(query: SearchParams, form: SearchForm) -> Self {
        Self {
            query,
            form: Some(form),
            no_aggregations: false,
        }
    }

    pub fn without_aggregations(mut self) -> Self {
        self.no_aggregations = true;
        self
    }

    pub fn limit(&self) -> u64 {
        resolve_limit(
            self.query.limit.as_deref(),
            self.form.as_ref().and_then(|form| form.limit.as_deref()),
        )
    }

    pub fn page(&self) -> u64 {
        resolve_page(
            self.query.p.as_deref(),
            self.form.as_ref().and_then(|form| form.p.as_deref()),
        )
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// A present form value wins even when it is garbage, which reads as 0.
fn positive_or(query: Option<&str>, form: Option<&str>, default: u64) -> u64 {
    let value = match form {
        Some(raw) => parse_int(raw).unwrap_or(0),
        None => query.and_then(parse_int).unwrap_or(0),
    };
    u64::try_from(value).ok().filter(|v| *v > 0).unwrap_or(default)
}

/// Page size; anything not a positive integer becomes [`DEFAULT_LIMIT`].
pub fn resolve_limit(query: Option<&str>, form: Option<&str>) -> u64 {
    positive_or(query, form, DEFAULT_LIMIT)
}

/// 1-based page number; anything not a positive integer becomes [`DEFAULT_PAGE`].
pub fn resolve_page(query: Option<&str>, form: Option<&str>) -> u64 {
    positive_or(query, form, DEFAULT_PAGE)
}

#[derive(Debug, Clone)]
pub struct BlogSearchPage {
    pub search_term: String,
    pub listing: EntitySearchResult<BlogEntry>,
    pub robots: &'static str,
    pub no_aggregations: bool,
}

#[derive(Clone)]
pub struct BlogSearchPageLoader {
    blogs: Arc<dyn BlogRepo>,
}

impl BlogSearchPageLoader {
    pub fn new(blogs: Arc<dyn BlogRepo>) -> Self {
        Self { blogs }
    }

    #[instrument(skip_all, fields(sales_channel = %context.sales_channel_id))]
    pub async fn load(
        &self,
        request: &SearchRequest,
        context: &StorefrontContext,
    ) -> Result<BlogSearchPage, SearchError> {
        let Some(term) = request.query.search.clone() else {
            return Err(SearchError::MissingParameter("search"));
        };

        tracer::record(EntityKey::BlogIndex);

        let criteria = create_criteria(&term, request);
        let listing = self.blogs.search(&criteria).await?;

        Ok(BlogSearchPage {
            search_term: term,
            listing,
            robots: SEARCH_ROBOTS,
            no_aggregations: request.no_aggregations,
        })
    }
}

impl BlogSearchPageLoader {
    /// Newest visible entries, used by the home page.
    #[instrument(skip_all)]
    pub async fn load_latest(
        &self,
        limit: u64,
    ) -> Result<EntitySearchResult<BlogEntry>, SearchError> {
        tracer::record(EntityKey::BlogIndex);

        let mut criteria = Criteria::new();
        criteria.limit = Some(limit.max(1));
        criteria
            .add_filter(Filter::Active(true))
            .add_filter(Filter::PublishedBefore(OffsetDateTime::now_utc()))
            .add_associations(&[Association::Categories]);

        Ok(self.blogs.search(&criteria).await?)
    }
}

pub fn create_criteria(term: &str, request: &SearchRequest) -> Criteria {
    let limit = request.limit();
    let page = request.page();

    let mut criteria = Criteria::new();
    criteria.term = Some(term.to_string());
    criteria.limit = Some(limit);
    criteria.offset = (page - 1).saturating_mul(limit);
    criteria.title = Some(CRITERIA_TITLE.to_string());
    criteria.total_count_mode = TotalCountMode::Exact;
    criteria.add_associations(&[Association::Categories]);
    criteria
}

#[cfg(test)]
mod tests {
    use time::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::domain::entities::BlogEntryRecord;
    use crate::infra::memory::MemoryBlogStore;

    fn record(title: &str, active: bool, published_at: OffsetDateTime) -> BlogEntryRecord {
        BlogEntryRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            teaser: String::new(),
            body: String::new(),
            author_id: None,
            published_at: Some(published_at),
            active,
            media_id: None,
            created_at: published_at,
            updated_at: None,
        }
    }

    fn query(search: Option<&str>, limit: Option<&str>, p: Option<&str>) -> SearchParams {
        SearchParams {
            search: search.map(str::to_string),
            limit: limit.map(str::to_string),
            p: p.map(str::to_string),
        }
    }

    #[test]
    fn non_positive_values_fall_back_to_defaults() {
        assert_eq!(resolve_limit(Some("-5"), None), 24);
        assert_eq!(resolve_limit(Some("0"), None), 24);
        assert_eq!(resolve_limit(None, None), 24);
        assert_eq!(resolve_limit(Some("ten"), None), 24);
        assert_eq!(resolve_page(Some("0"), None), 1);
        assert_eq!(resolve_page(Some("-3"), None), 1);
        assert_eq!(resolve_page(None, None), 1);
    }

    #[test]
    fn positive_values_are_echoed() {
        assert_eq!(resolve_limit(Some("10"), None), 10);
        assert_eq!(resolve_limit(Some(" 7 "), None), 7);
        assert_eq!(resolve_page(Some("3"), None), 3);
    }

    #[test]
    fn form_values_override_query_values() {
        assert_eq!(resolve_limit(Some("10"), Some("5")), 5);
        assert_eq!(resolve_page(Some("2"), Some("4")), 4);
        assert_eq!(resolve_limit(Some("10"), Some("-1")), 24);
    }

    #[test]
    fn unparsable_form_values_fall_back_to_defaults() {
        assert_eq!(resolve_limit(Some("10"), Some("x")), DEFAULT_LIMIT);
        assert_eq!(resolve_page(Some("3"), Some("")), DEFAULT_PAGE);
        assert_eq!(resolve_limit(Some("10"), None), 10);
    }

    #[test]
    fn offset_is_previous_pages_times_limit() {
        let request = SearchRequest::get(query(Some("rust"), Some("10"), Some("3")));
        let criteria = create_criteria("rust", &request);
        assert_eq!(criteria.limit, Some(10));
        assert_eq!(criteria.offset, 20);
    }

    #[test]
    fn invalid_pagination_yields_first_default_page() {
        let request = SearchRequest::get(query(Some("rust"), Some("-5"), Some("0")));
        let criteria = create_criteria("rust", &request);
        assert_eq!(criteria.limit, Some(24));
        assert_eq!(criteria.offset, 0);
    }

    #[test]
    fn criteria_carries_title_count_mode_and_categories() {
        let request = SearchRequest::get(query(Some("rust"), None, None));
        let criteria = create_criteria("rust", &request);
        assert_eq!(criteria.term.as_deref(), Some("rust"));
        assert_eq!(criteria.title.as_deref(), Some(CRITERIA_TITLE));
        assert_eq!(criteria.total_count_mode, TotalCountMode::Exact);
        assert!(criteria.has_association(Association::Categories));
        assert!(!criteria.has_association(Association::Author));
    }

    #[test]
    fn post_request_reads_form_pagination() {
        let request = SearchRequest::post(
            query(Some("rust"), Some("10"), Some("1")),
            SearchForm {
                limit: Some("5".to_string()),
                p: Some("3".to_string()),
            },
        );
        assert_eq!(request.limit(), 5);
        assert_eq!(request.page(), 3);
        assert_eq!(create_criteria("rust", &request).offset, 10);
    }

    #[tokio::test]
    async fn missing_search_term_is_reported() {
        let store = Arc::new(MemoryBlogStore::new());
        let loader = BlogSearchPageLoader::new(store);
        let result = loader
            .load(&SearchRequest::get(query(None, None, None)), &StorefrontContext::default())
            .await;
        assert!(matches!(result, Err(SearchError::MissingParameter("search"))));
    }

    #[tokio::test]
    async fn load_pages_matching_entries() {
        let store = Arc::new(MemoryBlogStore::new());
        for (day, title) in [(1, "Rust tips"), (2, "Rust news"), (3, "Gardening")] {
            store
                .upsert_entry(record(title, true, OffsetDateTime::now_utc() - Duration::days(day)), &[])
                .await;
        }

        let loader = BlogSearchPageLoader::new(store);
        let request = SearchRequest::get(query(Some("rust"), Some("1"), Some("2")));
        let (page, tags) = tracer::with_tracer(loader.load(&request, &StorefrontContext::default())).await;
        let page = page.expect("page");

        assert_eq!(page.search_term, "rust");
        assert_eq!(page.robots, SEARCH_ROBOTS);
        assert_eq!(page.listing.total, 2);
        assert_eq!(page.listing.len(), 1);
        assert_eq!(page.listing.items[0].record.title, "Rust news");
        assert!(tags.contains(&EntityKey::BlogIndex.tag()));
    }

    #[tokio::test]
    async fn latest_skips_hidden_entries() {
        let store = Arc::new(MemoryBlogStore::new());
        let past = OffsetDateTime::now_utc() - Duration::days(1);
        store.upsert_entry(record("Visible", true, past), &[]).await;
        store.upsert_entry(record("Inactive", false, past), &[]).await;
        store
            .upsert_entry(record("Scheduled", true, OffsetDateTime::now_utc() + Duration::days(1)), &[])
            .await;

        let latest = BlogSearchPageLoader::new(store)
            .load_latest(DEFAULT_LIMIT)
            .await
            .expect("latest");
        let titles: Vec<&str> = latest.items.iter().map(|entry| entry.record.title.as_str()).collect();
        assert_eq!(titles, vec!["Visible"]);
    }
}
