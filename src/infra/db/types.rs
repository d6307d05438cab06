use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{AuthorRecord, BlogEntryRecord, CategoryRecord, SeoUrlRecord};

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub(crate) id: Uuid,
    pub(crate) title: String,
    pub(crate) slug: String,
    pub(crate) teaser: String,
    pub(crate) body: String,
    pub(crate) author_id: Option<Uuid>,
    pub(crate) published_at: Option<OffsetDateTime>,
    pub(crate) active: bool,
    pub(crate) media_id: Option<Uuid>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: Option<OffsetDateTime>,
}

impl From<EntryRow> for BlogEntryRecord {
    fn from(row: EntryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            teaser: row.teaser,
            body: row.body,
            author_id: row.author_id,
            published_at: row.published_at,
            active: row.active,
            media_id: row.media_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AuthorRow {
    pub(crate) id: Uuid,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

/// A category joined through `sas_blog_entry_categories`.
#[derive(sqlx::FromRow)]
pub(crate) struct EntryCategoryRow {
    pub(crate) entry_id: Uuid,
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) position: i32,
}

impl EntryCategoryRow {
    pub(crate) fn into_parts(self) -> (Uuid, CategoryRecord) {
        (
            self.entry_id,
            CategoryRecord {
                id: self.id,
                name: self.name,
                position: self.position,
            },
        )
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SeoUrlRow {
    pub(crate) entry_id: Uuid,
    pub(crate) route_name: String,
    pub(crate) path_info: String,
    pub(crate) seo_path_info: String,
    pub(crate) is_canonical: bool,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<SeoUrlRow> for SeoUrlRecord {
    fn from(row: SeoUrlRow) -> Self {
        Self {
            entry_id: row.entry_id,
            route_name: row.route_name,
            path_info: row.path_info,
            seo_path_info: row.seo_path_info,
            is_canonical: row.is_canonical,
            updated_at: row.updated_at,
        }
    }
}
