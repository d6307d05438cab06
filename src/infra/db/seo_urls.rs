use async_trait::async_trait;
use uuid::Uuid;

use super::PostgresRepositories;
use super::types::SeoUrlRow;
use super::util::map_sqlx_error;
use crate::application::repos::{RepoError, SeoUrlsRepo};
use crate::domain::entities::SeoUrlRecord;

const ROUTE_PATH_CONSTRAINT: &str = "sas_blog_seo_urls_route_path_key";

#[async_trait]
impl SeoUrlsRepo for PostgresRepositories {
    async fn upsert_canonical(&self, url: &SeoUrlRecord) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            UPDATE sas_blog_seo_urls
            SET is_canonical = FALSE
            WHERE route_name = $1 AND entry_id = $2 AND seo_path_info <> $3 AND is_canonical
            "#,
        )
        .bind(&url.route_name)
        .bind(url.entry_id)
        .bind(&url.seo_path_info)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // the conflict arm only fires for the entry's own path
        let result = sqlx::query(
            r#"
            INSERT INTO sas_blog_seo_urls
                (entry_id, route_name, path_info, seo_path_info, is_canonical, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5)
            ON CONFLICT ON CONSTRAINT sas_blog_seo_urls_route_path_key DO UPDATE
            SET path_info = EXCLUDED.path_info,
                is_canonical = TRUE,
                updated_at = EXCLUDED.updated_at
            WHERE sas_blog_seo_urls.entry_id = EXCLUDED.entry_id
            "#,
        )
        .bind(url.entry_id)
        .bind(&url.route_name)
        .bind(&url.path_info)
        .bind(&url.seo_path_info)
        .bind(url.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Err(RepoError::Duplicate {
                constraint: ROUTE_PATH_CONSTRAINT.to_string(),
            });
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn find_by_seo_path(
        &self,
        route_name: &str,
        seo_path_info: &str,
    ) -> Result<Option<SeoUrlRecord>, RepoError> {
        let row = sqlx::query_as::<_, SeoUrlRow>(
            r#"
            SELECT entry_id, route_name, path_info, seo_path_info, is_canonical, updated_at
            FROM sas_blog_seo_urls
            WHERE route_name = $1 AND seo_path_info = $2
            "#,
        )
        .bind(route_name)
        .bind(seo_path_info)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SeoUrlRecord::from))
    }

    async fn find_canonical_for_entries(
        &self,
        route_name: &str,
        entry_ids: &[Uuid],
    ) -> Result<Vec<SeoUrlRecord>, RepoError> {
        if entry_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, SeoUrlRow>(
            r#"
            SELECT entry_id, route_name, path_info, seo_path_info, is_canonical, updated_at
            FROM sas_blog_seo_urls
            WHERE route_name = $1 AND entry_id = ANY($2) AND is_canonical
            "#,
        )
        .bind(route_name)
        .bind(entry_ids.to_vec())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SeoUrlRecord::from).collect())
    }
}
