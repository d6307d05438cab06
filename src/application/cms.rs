//! CMS slot data resolution.
//!
//! A page is made of slots; each slot has a type and, once resolved, the data
//! its element renders. Element resolvers run in two phases: `collect` says
//! which entities a slot needs, the [`CmsSlotResolver`] fetches them, and
//! `enrich` copies the result onto the slot.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::application::context::StorefrontContext;
use crate::application::criteria::{Association, Criteria, EntitySearchResult, Filter};
use crate::application::repos::{BlogRepo, RepoError};
use crate::domain::entities::BlogEntry;

pub const BLOG_DETAIL_TYPE: &str = "blog-detail";
const BLOG_RESULT_KEY: &str = "sas_blog";

#[derive(Debug, Clone, PartialEq)]
pub struct CmsSlot {
    pub id: String,
    pub slot_type: String,
    pub data: Option<BlogEntry>,
}

impl CmsSlot {
    pub fn new(id: impl Into<String>, slot_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slot_type: slot_type.into(),
            data: None,
        }
    }
}

/// Storefront context plus the request parameters slots may read.
#[derive(Debug, Clone, Default)]
pub struct ResolverContext {
    pub context: StorefrontContext,
    pub params: HashMap<String, String>,
}

impl ResolverContext {
    pub fn new(context: StorefrontContext) -> Self {
        Self {
            context,
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

pub type CriteriaCollection = BTreeMap<String, Criteria>;
pub type ElementDataCollection = HashMap<String, EntitySearchResult<BlogEntry>>;

pub trait CmsElementResolver: Send + Sync {
    fn element_type(&self) -> &'static str;

    /// Criteria to fetch for `slot`; `None` when there is nothing to load.
    fn collect(&self, slot: &CmsSlot, context: &ResolverContext) -> Option<CriteriaCollection>;

    fn enrich(&self, slot: &mut CmsSlot, context: &ResolverContext, result: &ElementDataCollection);
}

/// Loads the article named by the `articleId` request parameter.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlogDetailCmsElementResolver;

impl CmsElementResolver for BlogDetailCmsElementResolver {
    fn element_type(&self) -> &'static str {
        BLOG_DETAIL_TYPE
    }

    fn collect(&self, _slot: &CmsSlot, context: &ResolverContext) -> Option<CriteriaCollection> {
        let article_id = context
            .param("articleId")
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())?;

        let mut criteria = Criteria::new();
        criteria
            .add_filter(Filter::Active(true))
            .add_filter(Filter::Id(article_id))
            .add_associations(&[Association::Author, Association::Categories]);

        Some(CriteriaCollection::from([(
            BLOG_RESULT_KEY.to_string(),
            criteria,
        )]))
    }

    fn enrich(&self, slot: &mut CmsSlot, _context: &ResolverContext, result: &ElementDataCollection) {
        if let Some(entry) = result.get(BLOG_RESULT_KEY).and_then(EntitySearchResult::first) {
            slot.data = Some(entry.clone());
        }
    }
}

/// Dispatches slots to the element resolver registered for their type.
#[derive(Clone)]
pub struct CmsSlotResolver {
    blogs: Arc<dyn BlogRepo>,
    resolvers: HashMap<&'static str, Arc<dyn CmsElementResolver>>,
}

impl CmsSlotResolver {
    pub fn new(blogs: Arc<dyn BlogRepo>) -> Self {
        Self {
            blogs,
            resolvers: HashMap::new(),
        }
    }

    /// Resolver preloaded with the blog element types.
    pub fn with_blog_elements(blogs: Arc<dyn BlogRepo>) -> Self {
        let mut resolver = Self::new(blogs);
        resolver.register(Arc::new(BlogDetailCmsElementResolver));
        resolver
    }

    pub fn register(&mut self, resolver: Arc<dyn CmsElementResolver>) {
        self.resolvers.insert(resolver.element_type(), resolver);
    }

    /// Fill slot data in place. Slots of unknown type are left untouched.
    pub async fn resolve(
        &self,
        slots: &mut [CmsSlot],
        context: &ResolverContext,
    ) -> Result<(), RepoError> {
        for slot in slots.iter_mut() {
            let Some(resolver) = self.resolvers.get(slot.slot_type.as_str()) else {
                debug!(slot = %slot.id, slot_type = %slot.slot_type, "no resolver for slot type");
                continue;
            };

            let Some(collection) = resolver.collect(slot, context) else {
                continue;
            };

            let mut data = ElementDataCollection::with_capacity(collection.len());
            for (key, criteria) in collection {
                let result = self.blogs.search(&criteria).await?;
                data.insert(key, result);
            }

            resolver.enrich(slot, context, &data);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::BlogEntryRecord;

    fn entry(id: Uuid) -> BlogEntry {
        BlogEntry::new(BlogEntryRecord {
            id,
            title: "Hello".to_string(),
            slug: "hello".to_string(),
            teaser: String::new(),
            body: String::new(),
            author_id: None,
            published_at: Some(datetime!(2024-01-01 0:00 UTC)),
            active: true,
            media_id: None,
            created_at: datetime!(2024-01-01 0:00 UTC),
            updated_at: None,
        })
    }

    #[test]
    fn collect_builds_active_id_criteria_with_associations() {
        let id = Uuid::new_v4();
        let ctx = ResolverContext::default().with_param("articleId", id.to_string());
        let slot = CmsSlot::new("s1", BLOG_DETAIL_TYPE);

        let collection = BlogDetailCmsElementResolver
            .collect(&slot, &ctx)
            .expect("criteria");
        let criteria = &collection[BLOG_RESULT_KEY];

        assert!(criteria.filters.contains(&Filter::Active(true)));
        assert!(criteria.filters.contains(&Filter::Id(id)));
        assert!(criteria.has_association(Association::Author));
        assert!(criteria.has_association(Association::Categories));
    }

    #[test]
    fn collect_without_valid_article_id_loads_nothing() {
        let slot = CmsSlot::new("s1", BLOG_DETAIL_TYPE);
        assert!(
            BlogDetailCmsElementResolver
                .collect(&slot, &ResolverContext::default())
                .is_none()
        );

        let ctx = ResolverContext::default().with_param("articleId", "not-a-uuid");
        assert!(BlogDetailCmsElementResolver.collect(&slot, &ctx).is_none());
    }

    #[test]
    fn enrich_sets_first_entity() {
        let id = Uuid::new_v4();
        let mut slot = CmsSlot::new("s1", BLOG_DETAIL_TYPE);
        let criteria = Criteria::new();
        let mut result = EntitySearchResult::empty(&criteria);
        result.items.push(entry(id));
        let data = ElementDataCollection::from([(BLOG_RESULT_KEY.to_string(), result)]);

        BlogDetailCmsElementResolver.enrich(&mut slot, &ResolverContext::default(), &data);
        assert_eq!(slot.data.as_ref().map(BlogEntry::id), Some(id));
    }

    #[test]
    fn enrich_with_empty_result_leaves_slot_empty() {
        let mut slot = CmsSlot::new("s1", BLOG_DETAIL_TYPE);
        let data = ElementDataCollection::from([(
            BLOG_RESULT_KEY.to_string(),
            EntitySearchResult::empty(&Criteria::new()),
        )]);

        BlogDetailCmsElementResolver.enrich(&mut slot, &ResolverContext::default(), &data);
        assert!(slot.data.is_none());

        BlogDetailCmsElementResolver.enrich(
            &mut slot,
            &ResolverContext::default(),
            &ElementDataCollection::new(),
        );
        assert!(slot.data.is_none());
    }
}
