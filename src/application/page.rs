use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::application::cms::{BLOG_DETAIL_TYPE, CmsSlot, CmsSlotResolver, ResolverContext};
use crate::application::context::StorefrontContext;
use crate::application::criteria::{Association, Criteria, Filter};
use crate::application::repos::{BlogRepo, RepoError};
use crate::cache::{EntityKey, tracer};
use crate::domain::entities::BlogEntry;

pub const DETAIL_SLOT_ID: &str = "blog-detail";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("blog entry `{article_id}` not found")]
    NotFound { article_id: String },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Hook run on the detail criteria before the entry is queried.
pub trait CriteriaExtension: Send + Sync {
    fn extend(&self, article_id: &str, criteria: &mut Criteria, context: &StorefrontContext);
}

#[derive(Debug, Clone)]
pub struct BlogPage {
    pub entry: BlogEntry,
    pub slots: Vec<CmsSlot>,
}

impl BlogPage {
    pub fn detail_slot(&self) -> Option<&CmsSlot> {
        self.slots.iter().find(|slot| slot.slot_type == BLOG_DETAIL_TYPE)
    }
}

#[derive(Clone)]
pub struct BlogPageLoader {
    blogs: Arc<dyn BlogRepo>,
    cms: CmsSlotResolver,
    extensions: Vec<Arc<dyn CriteriaExtension>>,
}

impl BlogPageLoader {
    pub fn new(blogs: Arc<dyn BlogRepo>, cms: CmsSlotResolver) -> Self {
        Self {
            blogs,
            cms,
            extensions: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: Arc<dyn CriteriaExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    #[instrument(skip_all, fields(article_id = %article_id))]
    pub async fn load(
        &self,
        article_id: &str,
        context: &StorefrontContext,
    ) -> Result<BlogPage, PageError> {
        let not_found = || PageError::NotFound {
            article_id: article_id.to_string(),
        };
        let id = Uuid::parse_str(article_id.trim()).map_err(|_| not_found())?;

        tracer::record(EntityKey::BlogEntry(id));

        let mut criteria = Criteria::new();
        criteria
            .add_filter(Filter::Id(id))
            .add_filter(Filter::Active(true))
            .add_filter(Filter::PublishedBefore(OffsetDateTime::now_utc()))
            .add_associations(&[Association::Author, Association::Categories]);

        for extension in &self.extensions {
            extension.extend(article_id, &mut criteria, context);
        }

        let entry = self
            .blogs
            .search(&criteria)
            .await?
            .into_first()
            .ok_or_else(not_found)?;

        let resolver_context =
            ResolverContext::new(context.clone()).with_param("articleId", id.to_string());
        let mut slots = vec![CmsSlot::new(DETAIL_SLOT_ID, BLOG_DETAIL_TYPE)];
        self.cms.resolve(&mut slots, &resolver_context).await?;

        Ok(BlogPage { entry, slots })
    }
}
