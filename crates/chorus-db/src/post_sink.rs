use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use chorus_core::models::PostMediaFields;
use chorus_core::PostMediaSink;

/// Postgres implementation of the content-record propagation hook.
///
/// Writes the media_* columns of the platform's posts table. Not
/// transactional with the job's completion write; the worker treats a
/// failure here as best-effort and logs it.
#[derive(Clone)]
pub struct PgPostSink {
    pool: PgPool,
}

impl PgPostSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostMediaSink for PgPostSink {
    #[tracing::instrument(skip(self, fields))]
    async fn apply(&self, post_id: Uuid, fields: &PostMediaFields) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET media_url = $2,
                media_thumbnail_url = $3,
                media_duration_seconds = $4,
                media_width = $5,
                media_height = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(post_id)
        .bind(&fields.media_url)
        .bind(&fields.thumbnail_url)
        .bind(fields.duration_seconds)
        .bind(fields.width)
        .bind(fields.height)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(post_id = %post_id, "Post not found during media propagation");
        } else {
            tracing::debug!(post_id = %post_id, "Post media fields updated");
        }

        Ok(())
    }
}
