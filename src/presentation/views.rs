use std::collections::HashMap;

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

use crate::application::criteria::EntitySearchResult;
use crate::application::error::{ErrorReport, HttpError};
use crate::application::page::BlogPage;
use crate::application::search::BlogSearchPage;
use crate::application::seo::path_info;
use crate::config::SiteSettings;
use crate::domain::entities::BlogEntry;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(site: &SiteSettings) -> Response {
    let view = LayoutContext::new(
        PageMetaView::new(site, "Page Not Found", "/"),
        site,
        ErrorPageView::not_found(),
    );
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub description: String,
    pub canonical: String,
    /// Empty when the page carries no robots directive.
    pub robots: String,
}

impl PageMetaView {
    pub fn new(site: &SiteSettings, title: &str, path: &str) -> Self {
        Self {
            title: format!("{title} | {}", site.title),
            description: site.description.clone(),
            canonical: absolute_url(site, path),
            robots: String::new(),
        }
    }

    pub fn with_robots(self, robots: &str) -> Self {
        Self {
            robots: robots.to_string(),
            ..self
        }
    }

    pub fn with_description(self, description: &str) -> Self {
        if description.trim().is_empty() {
            return self;
        }
        Self {
            description: description.trim().to_string(),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(meta: PageMetaView, site: &SiteSettings, content: T) -> Self {
        Self {
            brand: BrandView {
                title: site.title.clone(),
                href: "/".to_string(),
            },
            meta,
            content,
        }
    }
}

/// Absolute url below the configured public site url.
pub fn absolute_url(site: &SiteSettings, path: &str) -> String {
    format!("{}{}", site.public_url, path.trim_start_matches('/'))
}

/// Link to an entry: its canonical SEO path when one exists, otherwise the
/// technical detail route.
pub fn entry_href(links: &HashMap<Uuid, String>, entry_id: Uuid) -> String {
    match links.get(&entry_id) {
        Some(seo_path) => format!("/{}", seo_path.trim_start_matches('/')),
        None => path_info(entry_id),
    }
}

fn format_date(value: Option<OffsetDateTime>) -> (String, String) {
    let Some(value) = value else {
        return (String::new(), String::new());
    };
    let display = value
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default();
    let iso = value
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    (display, iso)
}

#[derive(Clone)]
pub struct EntryCard {
    pub href: String,
    pub title: String,
    pub teaser: String,
    pub published: String,
    pub iso_date: String,
    pub categories: Vec<String>,
}

impl EntryCard {
    pub fn new(entry: &BlogEntry, links: &HashMap<Uuid, String>) -> Self {
        let (published, iso_date) = format_date(entry.record.published_at);
        Self {
            href: entry_href(links, entry.id()),
            title: entry.record.title.clone(),
            teaser: entry.record.teaser.clone(),
            published,
            iso_date,
            categories: entry
                .categories
                .iter()
                .map(|category| category.name.clone())
                .collect(),
        }
    }
}

fn cards(listing: &EntitySearchResult<BlogEntry>, links: &HashMap<Uuid, String>) -> Vec<EntryCard> {
    listing
        .items
        .iter()
        .map(|entry| EntryCard::new(entry, links))
        .collect()
}

pub struct HomeView {
    pub entries: Vec<EntryCard>,
    pub has_results: bool,
}

impl HomeView {
    pub fn new(listing: &EntitySearchResult<BlogEntry>, links: &HashMap<Uuid, String>) -> Self {
        let entries = cards(listing, links);
        Self {
            has_results: !entries.is_empty(),
            entries,
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub view: LayoutContext<HomeView>,
}

pub struct SearchResultsView {
    pub search_term: String,
    pub entries: Vec<EntryCard>,
    pub has_results: bool,
    pub total: u64,
    pub page: u64,
    pub page_count: u64,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    /// Set for the pagelet, which leaves out filter facets.
    pub no_aggregations: bool,
}

impl SearchResultsView {
    pub fn new(page: &BlogSearchPage, links: &HashMap<Uuid, String>, base_path: &str) -> Self {
        let listing = &page.listing;
        let entries = cards(listing, links);
        let current = listing.page();
        let page_count = listing.page_count();
        let limit = listing.limit.unwrap_or_default();

        let href = |target: u64| {
            format!(
                "{base_path}?search={}&limit={limit}&p={target}",
                encode_query_value(&page.search_term)
            )
        };

        Self {
            search_term: page.search_term.clone(),
            has_results: !entries.is_empty(),
            entries,
            total: listing.total,
            page: current,
            page_count,
            prev_href: (current > 1).then(|| href(current - 1)),
            next_href: (current < page_count).then(|| href(current + 1)),
            no_aggregations: page.no_aggregations,
        }
    }
}

fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub view: LayoutContext<()>,
    pub results: SearchResultsView,
}

#[derive(Template)]
#[template(path = "partials/search_results.html")]
pub struct SearchPageletTemplate {
    pub results: SearchResultsView,
}

pub struct DetailView {
    pub title: String,
    pub author: String,
    pub published: String,
    pub iso_date: String,
    pub categories: Vec<String>,
    pub teaser: String,
    /// Stored entry body; authored markup rendered as-is.
    pub body_html: String,
}

impl DetailView {
    pub fn new(page: &BlogPage) -> Self {
        // the CMS slot carries the entry the element resolver loaded
        let entry = page
            .detail_slot()
            .and_then(|slot| slot.data.as_ref())
            .unwrap_or(&page.entry);
        let (published, iso_date) = format_date(entry.record.published_at);

        Self {
            title: entry.record.title.clone(),
            author: entry
                .author
                .as_ref()
                .map(|author| author.display_name())
                .unwrap_or_default(),
            published,
            iso_date,
            categories: entry
                .categories
                .iter()
                .map(|category| category.name.clone())
                .collect(),
            teaser: entry.record.teaser.clone(),
            body_html: entry.record.body.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct DetailTemplate {
    pub view: LayoutContext<DetailView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::application::cms::{BLOG_DETAIL_TYPE, CmsSlot};
    use crate::application::search::SEARCH_ROBOTS;
    use crate::domain::entities::{AuthorRecord, BlogEntryRecord, CategoryRecord};

    fn site() -> SiteSettings {
        SiteSettings {
            public_url: "https://shop.example/".to_string(),
            title: "Shop".to_string(),
            description: "Stories".to_string(),
        }
    }

    fn entry(title: &str) -> BlogEntry {
        let mut entry = BlogEntry::new(BlogEntryRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: title.to_lowercase(),
            teaser: "Short <teaser>".to_string(),
            body: "<p>Body</p>".to_string(),
            author_id: None,
            published_at: Some(datetime!(2024-03-05 10:00 UTC)),
            active: true,
            media_id: None,
            created_at: datetime!(2024-03-01 0:00 UTC),
            updated_at: None,
        });
        entry.categories = vec![CategoryRecord {
            id: Uuid::new_v4(),
            name: "News".to_string(),
            position: 0,
        }];
        entry
    }

    fn listing(items: Vec<BlogEntry>, total: u64, limit: u64, offset: u64) -> EntitySearchResult<BlogEntry> {
        EntitySearchResult {
            items,
            total,
            limit: Some(limit),
            offset,
        }
    }

    #[test]
    fn entry_href_prefers_seo_path() {
        let id = Uuid::new_v4();
        let mut links = HashMap::new();
        assert_eq!(entry_href(&links, id), format!("/sas_blog/{id}"));

        links.insert(id, "blog/news/hello".to_string());
        assert_eq!(entry_href(&links, id), "/blog/news/hello");
    }

    #[test]
    fn search_results_link_neighbour_pages() {
        let page = BlogSearchPage {
            search_term: "fish & chips".to_string(),
            listing: listing(vec![entry("One")], 30, 10, 10),
            robots: SEARCH_ROBOTS,
            no_aggregations: false,
        };
        let view = SearchResultsView::new(&page, &HashMap::new(), "/sas_blog/search");

        assert_eq!(view.page, 2);
        assert_eq!(view.page_count, 3);
        assert_eq!(
            view.prev_href.as_deref(),
            Some("/sas_blog/search?search=fish+%26+chips&limit=10&p=1")
        );
        assert_eq!(
            view.next_href.as_deref(),
            Some("/sas_blog/search?search=fish+%26+chips&limit=10&p=3")
        );
    }

    #[test]
    fn search_template_escapes_term_and_sets_robots() {
        let page = BlogSearchPage {
            search_term: "<script>".to_string(),
            listing: listing(vec![entry("Hello")], 1, 24, 0),
            robots: SEARCH_ROBOTS,
            no_aggregations: false,
        };
        let site = site();
        let view = LayoutContext::new(
            PageMetaView::new(&site, "Search", "/sas_blog/search").with_robots(SEARCH_ROBOTS),
            &site,
            (),
        );
        let results = SearchResultsView::new(&page, &HashMap::new(), "/sas_blog/search");
        let html = render_template(SearchTemplate { view, results })
            .expect("render")
            .0;

        assert!(html.contains("noindex,follow"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Hello"));
    }

    #[test]
    fn detail_view_reads_slot_entry() {
        let mut slot_entry = entry("From Slot");
        slot_entry.author = Some(AuthorRecord {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        });
        let mut slot = CmsSlot::new("blog-detail", BLOG_DETAIL_TYPE);
        slot.data = Some(slot_entry);

        let page = BlogPage {
            entry: entry("From Page"),
            slots: vec![slot],
        };
        let view = DetailView::new(&page);
        assert_eq!(view.title, "From Slot");
        assert_eq!(view.author, "Ada Lovelace");
        assert_eq!(view.published, "2024-03-05");
        assert_eq!(view.categories, vec!["News".to_string()]);
    }

    #[test]
    fn not_found_response_carries_report() {
        let response = render_not_found_response(&site());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
