//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl AuthorRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub name: String,
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlogEntryRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub teaser: String,
    pub body: String,
    pub author_id: Option<Uuid>,
    pub published_at: Option<OffsetDateTime>,
    pub active: bool,
    pub media_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

/// A blog entry together with whichever associations the query asked for.
///
/// `author` stays `None` and `categories` stays empty when the association
/// was not requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlogEntry {
    #[serde(flatten)]
    pub record: BlogEntryRecord,
    pub author: Option<AuthorRecord>,
    pub categories: Vec<CategoryRecord>,
}

impl BlogEntry {
    pub fn new(record: BlogEntryRecord) -> Self {
        Self {
            record,
            author: None,
            categories: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.record.id
    }

    /// Active entries whose publication time has been reached.
    pub fn is_visible_at(&self, now: OffsetDateTime) -> bool {
        self.record.active
            && self
                .record
                .published_at
                .is_some_and(|published| published <= now)
    }

    /// First associated category, ordered by position then name.
    pub fn first_category(&self) -> Option<&CategoryRecord> {
        self.categories
            .iter()
            .min_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeoUrlRecord {
    pub entry_id: Uuid,
    pub route_name: String,
    pub path_info: String,
    pub seo_path_info: String,
    pub is_canonical: bool,
    pub updated_at: OffsetDateTime,
}
