//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::criteria::{Criteria, EntitySearchResult};
use crate::domain::entities::{BlogEntry, SeoUrlRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read access to blog entries.
#[async_trait]
pub trait BlogRepo: Send + Sync {
    /// Run a criteria query. Associations named in the criteria are loaded
    /// onto each returned entry; `total` follows the criteria's count mode.
    async fn search(&self, criteria: &Criteria) -> Result<EntitySearchResult<BlogEntry>, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

/// Storage for generated SEO urls.
#[async_trait]
pub trait SeoUrlsRepo: Send + Sync {
    /// Store `url` as the canonical url of its entry. Earlier urls of the
    /// same entry and route stay resolvable but lose the canonical flag.
    async fn upsert_canonical(&self, url: &SeoUrlRecord) -> Result<(), RepoError>;

    /// Look up any url (canonical or not) by its SEO path.
    async fn find_by_seo_path(
        &self,
        route_name: &str,
        seo_path_info: &str,
    ) -> Result<Option<SeoUrlRecord>, RepoError>;

    /// Canonical urls for the given entries; entries without one are absent.
    async fn find_canonical_for_entries(
        &self,
        route_name: &str,
        entry_ids: &[Uuid],
    ) -> Result<Vec<SeoUrlRecord>, RepoError>;
}
