use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::PostgresRepositories;
use super::types::{AuthorRow, EntryCategoryRow, EntryRow};
use super::util::{convert_count, like_pattern, map_sqlx_error, to_bigint};
use crate::application::criteria::{
    Association, Criteria, EntitySearchResult, Filter, TotalCountMode,
};
use crate::application::repos::{BlogRepo, RepoError};
use crate::domain::entities::{AuthorRecord, BlogEntry, BlogEntryRecord, CategoryRecord};

const ENTRY_COLUMNS: &str = "e.id, e.title, e.slug, e.teaser, e.body, e.author_id, \
     e.published_at, e.active, e.media_id, e.created_at, e.updated_at";

impl PostgresRepositories {
    fn apply_criteria(qb: &mut QueryBuilder<'_, Postgres>, criteria: &Criteria) {
        for filter in &criteria.filters {
            match filter {
                Filter::Active(active) => {
                    qb.push(" AND e.active = ");
                    qb.push_bind(*active);
                }
                Filter::Id(id) => {
                    qb.push(" AND e.id = ");
                    qb.push_bind(*id);
                }
                Filter::PublishedBefore(at) => {
                    qb.push(" AND e.published_at IS NOT NULL AND e.published_at <= ");
                    qb.push_bind(*at);
                }
            }
        }

        if let Some(term) = criteria.effective_term() {
            let pattern = like_pattern(term);
            qb.push(" AND (e.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR e.teaser ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR e.body ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }

    async fn count_entries(&self, criteria: &Criteria) -> Result<u64, RepoError> {
        let mut qb =
            QueryBuilder::new("SELECT COUNT(*) FROM (SELECT 1 FROM sas_blog_entries e WHERE 1=1 ");
        Self::apply_criteria(&mut qb, criteria);
        if criteria.total_count_mode == TotalCountMode::NextPages {
            if let Some(cap) = criteria.next_pages_cap() {
                qb.push(" LIMIT ");
                qb.push_bind(to_bigint(cap, "count cap")?);
            }
        }
        qb.push(") matched");

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        convert_count(count)
    }

    async fn load_authors(&self, ids: Vec<Uuid>) -> Result<HashMap<Uuid, AuthorRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, AuthorRow>(
            "SELECT id, first_name, last_name FROM sas_blog_authors WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.id, AuthorRecord::from(row)))
            .collect())
    }

    async fn load_categories(
        &self,
        entry_ids: Vec<Uuid>,
    ) -> Result<HashMap<Uuid, Vec<CategoryRecord>>, RepoError> {
        if entry_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, EntryCategoryRow>(
            r#"
            SELECT ec.entry_id, c.id, c.name, c.position
            FROM sas_blog_entry_categories ec
            INNER JOIN sas_blog_categories c ON c.id = ec.category_id
            WHERE ec.entry_id = ANY($1)
            ORDER BY c.position, c.name
            "#,
        )
        .bind(entry_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut grouped: HashMap<Uuid, Vec<CategoryRecord>> = HashMap::new();
        for row in rows {
            let (entry_id, category) = row.into_parts();
            grouped.entry(entry_id).or_default().push(category);
        }
        Ok(grouped)
    }

    async fn attach_associations(
        &self,
        records: Vec<BlogEntryRecord>,
        criteria: &Criteria,
    ) -> Result<Vec<BlogEntry>, RepoError> {
        let authors = if criteria.has_association(Association::Author) {
            let mut ids: Vec<Uuid> = records.iter().filter_map(|record| record.author_id).collect();
            ids.sort_unstable();
            ids.dedup();
            self.load_authors(ids).await?
        } else {
            HashMap::new()
        };

        let mut categories = if criteria.has_association(Association::Categories) {
            self.load_categories(records.iter().map(|record| record.id).collect())
                .await?
        } else {
            HashMap::new()
        };

        Ok(records
            .into_iter()
            .map(|record| {
                let author = record
                    .author_id
                    .and_then(|id| authors.get(&id).cloned());
                let categories = categories.remove(&record.id).unwrap_or_default();
                BlogEntry {
                    record,
                    author,
                    categories,
                }
            })
            .collect())
    }
}

#[async_trait]
impl BlogRepo for PostgresRepositories {
    async fn search(&self, criteria: &Criteria) -> Result<EntitySearchResult<BlogEntry>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(ENTRY_COLUMNS);
        qb.push(" FROM sas_blog_entries e WHERE 1=1 ");
        Self::apply_criteria(&mut qb, criteria);
        qb.push(" ORDER BY e.published_at DESC NULLS LAST, e.id ");

        if let Some(limit) = criteria.limit {
            qb.push(" LIMIT ");
            qb.push_bind(to_bigint(limit, "limit")?);
        }
        if criteria.offset > 0 {
            qb.push(" OFFSET ");
            qb.push_bind(to_bigint(criteria.offset, "offset")?);
        }

        let rows = qb
            .build_query_as::<EntryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        let records: Vec<BlogEntryRecord> = rows.into_iter().map(BlogEntryRecord::from).collect();

        let total = match criteria.total_count_mode {
            TotalCountMode::None => records.len() as u64,
            TotalCountMode::Exact | TotalCountMode::NextPages => {
                self.count_entries(criteria).await?
            }
        };

        let items = self.attach_associations(records, criteria).await?;

        Ok(EntitySearchResult {
            items,
            total,
            limit: criteria.limit,
            offset: criteria.offset,
        })
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
