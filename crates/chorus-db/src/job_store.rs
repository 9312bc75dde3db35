use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use chorus_core::models::{ClaimedJob, JobArtifacts, MediaJob};

/// Every column of a media_jobs row, shared by the RETURNING clauses below so
/// all writes hand back the same shape.
const JOB_COLUMNS: &str = r#"
    id,
    media_type,
    status,
    raw_file_url,
    raw_file_size,
    user_id,
    user_tier,
    post_id,
    progress,
    attempt,
    output_url,
    thumbnail_url,
    waveform_url,
    duration_seconds,
    width,
    height,
    error_message,
    created_at,
    updated_at,
    processed_at
"#;

/// Repository over the media_jobs table.
///
/// Workers share no in-memory state; every coordination point is a
/// single-row or bulk conditional update here. The claim and all
/// per-attempt writes are fenced on the `attempt` counter so a worker whose
/// job was reclaimed by the stale sweep cannot overwrite the newer attempt.
#[derive(Clone)]
pub struct JobStore {
    pool: PgPool,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically claim the oldest pending job.
    ///
    /// Selects the FIFO candidate, then attempts the conditional transition
    /// `pending -> processing` restricted to `WHERE id = $1 AND status =
    /// 'pending'`. Zero rows affected means another worker won the race; the
    /// call returns `None` instead of retrying the candidate; the caller's
    /// poll loop tries again on its next tick. The single conditional row
    /// update is the only atomicity primitive required; no lock service.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next(&self) -> Result<Option<ClaimedJob>> {
        let candidate: Option<Uuid> = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            SELECT id
            FROM media_jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to select claim candidate")?;

        let Some(candidate_id) = candidate else {
            return Ok(None);
        };

        let claimed: Option<MediaJob> = sqlx::query_as::<Postgres, MediaJob>(&format!(
            r#"
            UPDATE media_jobs
            SET status = 'processing',
                attempt = attempt + 1,
                progress = 0,
                error_message = NULL,
                updated_at = NOW()
            WHERE id = $1
                AND status = 'pending'
            RETURNING {JOB_COLUMNS}
            "#,
        ))
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to claim job")?;

        let Some(job) = claimed else {
            // Lost the race to another worker; not an error.
            tracing::debug!(job_id = %candidate_id, "Claim race lost, will retry on next poll");
            return Ok(None);
        };

        let username: Option<String> = sqlx::query_scalar::<Postgres, String>(
            "SELECT username FROM users WHERE id = $1",
        )
        .bind(job.user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch submitter identity")?;

        tracing::info!(
            job_id = %job.id,
            media_type = %job.media_type,
            user_tier = %job.user_tier,
            attempt = job.attempt,
            "Job claimed"
        );

        Ok(Some(ClaimedJob { job, username }))
    }

    /// Sweep jobs stuck in `processing` past the staleness threshold back to
    /// `pending`, assuming their worker died. Best-effort bulk update;
    /// returns the number of rows released.
    ///
    /// A merely slow worker may get its job reclaimed here. The attempt
    /// counter makes that safe: the slow worker's completion write is fenced
    /// on its old attempt value and affects zero rows.
    #[tracing::instrument(skip(self))]
    pub async fn release_stale(&self, older_than_secs: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE media_jobs
            SET status = 'pending',
                progress = 0,
                error_message = 'job timed out and was reset',
                updated_at = NOW()
            WHERE status = 'processing'
                AND updated_at < NOW() - ($1 * interval '1 second')
            "#,
        )
        .bind(older_than_secs)
        .execute(&self.pool)
        .await
        .context("Failed to release stale jobs")?;

        let released = result.rows_affected();
        if released > 0 {
            tracing::warn!(
                released = released,
                older_than_secs = older_than_secs,
                "Released stale jobs back to pending"
            );
        }

        Ok(released)
    }

    /// Persist a progress percentage for the given attempt.
    ///
    /// Fenced on `attempt`, and `GREATEST` keeps the stored value
    /// non-decreasing within the attempt. Returns false when the attempt was
    /// superseded; callers treat that as a signal to stop, not an error.
    #[tracing::instrument(skip(self))]
    pub async fn update_progress(&self, job_id: Uuid, attempt: i32, percent: i32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_jobs
            SET progress = GREATEST(progress, $3),
                updated_at = NOW()
            WHERE id = $1
                AND attempt = $2
                AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(attempt)
        .bind(clamp_percent(percent))
        .execute(&self.pool)
        .await
        .context("Failed to update job progress")?;

        Ok(result.rows_affected() > 0)
    }

    /// Final completion write for the given attempt.
    ///
    /// Returns false when the attempt was superseded by a stale reclaim; the
    /// caller discards its result in that case.
    #[tracing::instrument(skip(self, artifacts))]
    pub async fn mark_completed(
        &self,
        job_id: Uuid,
        attempt: i32,
        artifacts: &JobArtifacts,
    ) -> Result<bool> {
        let (output_url, thumbnail_url, waveform_url, duration, width, height) = match artifacts {
            JobArtifacts::Video(v) => (
                v.output_url.as_str(),
                Some(v.thumbnail_url.as_str()),
                None,
                v.duration_seconds,
                Some(v.width),
                Some(v.height),
            ),
            JobArtifacts::Audio(a) => (
                a.output_url.as_str(),
                None,
                Some(a.waveform_url.as_str()),
                a.duration_seconds,
                None,
                None,
            ),
        };

        let result = sqlx::query(
            r#"
            UPDATE media_jobs
            SET status = 'completed',
                progress = 100,
                output_url = $3,
                thumbnail_url = $4,
                waveform_url = $5,
                duration_seconds = $6,
                width = $7,
                height = $8,
                error_message = NULL,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
                AND attempt = $2
                AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(attempt)
        .bind(output_url)
        .bind(thumbnail_url)
        .bind(waveform_url)
        .bind(duration)
        .bind(width)
        .bind(height)
        .execute(&self.pool)
        .await
        .context("Failed to mark job as completed")?;

        let won = result.rows_affected() > 0;
        if won {
            tracing::info!(job_id = %job_id, attempt = attempt, "Job completed");
        } else {
            tracing::warn!(
                job_id = %job_id,
                attempt = attempt,
                "Completion write superseded by a newer attempt, result discarded"
            );
        }

        Ok(won)
    }

    /// Terminal failure write for the given attempt. Failed jobs are never
    /// retried by this core; resubmission is an external concern.
    #[tracing::instrument(skip(self, message))]
    pub async fn mark_failed(&self, job_id: Uuid, attempt: i32, message: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media_jobs
            SET status = 'failed',
                error_message = $3,
                processed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
                AND attempt = $2
                AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(attempt)
        .bind(message)
        .execute(&self.pool)
        .await
        .context("Failed to mark job as failed")?;

        let won = result.rows_affected() > 0;
        if won {
            tracing::error!(job_id = %job_id, attempt = attempt, error = %message, "Job failed");
        } else {
            tracing::warn!(
                job_id = %job_id,
                attempt = attempt,
                "Failure write superseded by a newer attempt"
            );
        }

        Ok(won)
    }

    /// Read a job row, e.g. for external status polling.
    #[tracing::instrument(skip(self))]
    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<MediaJob>> {
        let job: Option<MediaJob> = sqlx::query_as::<Postgres, MediaJob>(&format!(
            "SELECT {JOB_COLUMNS} FROM media_jobs WHERE id = $1",
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch job")?;

        Ok(job)
    }
}

fn clamp_percent(percent: i32) -> i32 {
    percent.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_clamped_to_valid_range() {
        assert_eq!(clamp_percent(-5), 0);
        assert_eq!(clamp_percent(0), 0);
        assert_eq!(clamp_percent(55), 55);
        assert_eq!(clamp_percent(100), 100);
        assert_eq!(clamp_percent(140), 100);
    }

    #[test]
    fn job_columns_cover_the_model() {
        // Keep the shared column list in sync with MediaJob::from_row.
        for column in [
            "id",
            "media_type",
            "status",
            "raw_file_url",
            "raw_file_size",
            "user_id",
            "user_tier",
            "post_id",
            "progress",
            "attempt",
            "output_url",
            "thumbnail_url",
            "waveform_url",
            "duration_seconds",
            "width",
            "height",
            "error_message",
            "created_at",
            "updated_at",
            "processed_at",
        ] {
            assert!(JOB_COLUMNS.contains(column), "missing column {}", column);
        }
    }
}
