use sqlx::PgPool;

use crate::{
    error::AppResult,
    models::{Video, VideoRow},
    services::catalog::VideoCatalog,
};

/// Catalog backed by the `videos` table
#[derive(Clone)]
pub struct PgVideoCatalog {
    db_pool: PgPool,
}

impl PgVideoCatalog {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait::async_trait]
impl VideoCatalog for PgVideoCatalog {
    async fn fetch_by_ids(&self, ids: &[String]) -> AppResult<Vec<Video>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query_as::<_, VideoRow>(
            r#"
            SELECT video_id, title, thumbnail_url, description
            FROM videos
            WHERE video_id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.db_pool)
        .await?;

        tracing::debug!(requested = ids.len(), found = rows.len(), "Resolved catalog rows");

        Ok(rows.into_iter().map(Video::from).collect())
    }

    async fn sample_candidates(&self, limit: usize) -> AppResult<Vec<Video>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let rows = sqlx::query_as::<_, VideoRow>(
            r#"
            SELECT video_id, title, thumbnail_url, description
            FROM videos
            ORDER BY random()
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(Video::from).collect())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
