//! The worker loop: sweep stale jobs, claim one, dispatch to the matching
//! pipeline inside an isolated working directory, persist the outcome, loop.
//!
//! Any number of worker processes run this loop concurrently; they share no
//! in-memory state and coordinate only through the Job Store's conditional
//! updates. Within one process, jobs run strictly sequentially.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use chorus_core::models::{ClaimedJob, JobArtifacts, MediaJob, MediaType, PostMediaFields};
use chorus_core::{PipelineError, PostMediaSink, WorkerConfig};
use chorus_db::JobStore;
use chorus_processing::{AudioPipeline, ProgressSink, VideoPipeline};

use crate::progress::JobProgressPublisher;

pub struct Worker {
    store: JobStore,
    post_sink: Arc<dyn PostMediaSink>,
    video: VideoPipeline,
    audio: AudioPipeline,
    poll_interval: Duration,
    stale_after_secs: i64,
    progress_write_interval: Duration,
}

impl Worker {
    pub fn new(
        store: JobStore,
        post_sink: Arc<dyn PostMediaSink>,
        video: VideoPipeline,
        audio: AudioPipeline,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            post_sink,
            video,
            audio,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            stale_after_secs: config.stale_after_secs,
            progress_write_interval: Duration::from_millis(config.progress_write_interval_ms),
        }
    }

    /// Poll forever. Claim failures and sweep failures are logged and the
    /// loop continues; nothing here is allowed to kill the worker.
    pub async fn run(&self) {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            stale_after_secs = self.stale_after_secs,
            "Worker loop started"
        );

        loop {
            if let Err(e) = self.store.release_stale(self.stale_after_secs).await {
                tracing::error!(error = %e, "Stale job sweep failed");
            }

            match self.store.claim_next().await {
                Ok(Some(claimed)) => {
                    // Loop straight back to the sweep; no delay after a job.
                    self.process(claimed).await;
                }
                Ok(None) => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim job");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Run one claimed job to a terminal state. Every pipeline error is
    /// converted into a single failure write here; nothing re-throws past
    /// this boundary.
    async fn process(&self, claimed: ClaimedJob) {
        let job = claimed.job;
        tracing::info!(
            job_id = %job.id,
            media_type = %job.media_type,
            user_tier = %job.user_tier,
            username = claimed.username.as_deref().unwrap_or("unknown"),
            "Processing job"
        );

        match self.execute(&job).await {
            Ok(artifacts) => {
                match self.store.mark_completed(job.id, job.attempt, &artifacts).await {
                    Ok(true) => {
                        if let Some(post_id) = job.post_id {
                            propagate_post(self.post_sink.as_ref(), post_id, &artifacts).await;
                        }
                    }
                    // Superseded by a stale reclaim; the newer attempt owns
                    // the job now, so the post is not touched either.
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(job_id = %job.id, error = %e, "Failed to record completion");
                    }
                }
            }
            Err(pipeline_err) => {
                let message = pipeline_err.to_string();
                if let Err(e) = self.store.mark_failed(job.id, job.attempt, &message).await {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to record failure");
                }
            }
        }
    }

    /// Dispatch on media type inside a fresh per-job working directory. The
    /// directory is removed when the guard drops, on every exit path.
    async fn execute(&self, job: &MediaJob) -> Result<JobArtifacts, PipelineError> {
        let workdir = job_workdir(job.id)?;
        let progress: Arc<dyn ProgressSink> = Arc::new(JobProgressPublisher::new(
            self.store.clone(),
            job.id,
            job.attempt,
            self.progress_write_interval,
        ));

        match job.media_type {
            MediaType::Video => self
                .video
                .run(job, workdir.path(), progress)
                .await
                .map(JobArtifacts::Video),
            MediaType::Audio => self
                .audio
                .run(job, workdir.path(), progress)
                .await
                .map(JobArtifacts::Audio),
        }
    }
}

/// Exclusive scratch directory for one job attempt.
fn job_workdir(job_id: Uuid) -> std::io::Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("chorus-job-{}-", job_id))
        .tempdir()
}

/// Best-effort propagation of the final media fields into the linked post.
async fn propagate_post(sink: &dyn PostMediaSink, post_id: Uuid, artifacts: &JobArtifacts) {
    let fields = PostMediaFields::from(artifacts);
    if let Err(e) = sink.apply(post_id, &fields).await {
        tracing::warn!(post_id = %post_id, error = %e, "Failed to propagate media fields to post");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chorus_core::models::VideoArtifacts;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPostSink {
        applied: Mutex<Vec<(Uuid, PostMediaFields)>>,
        fail: bool,
    }

    #[async_trait]
    impl PostMediaSink for RecordingPostSink {
        async fn apply(&self, post_id: Uuid, fields: &PostMediaFields) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("injected");
            }
            self.applied.lock().unwrap().push((post_id, fields.clone()));
            Ok(())
        }
    }

    fn video_artifacts() -> JobArtifacts {
        JobArtifacts::Video(VideoArtifacts {
            output_url: "https://cdn.test/media/u/video/1-a.mp4".to_string(),
            thumbnail_url: "https://cdn.test/media/u/thumbnail/1-a.jpg".to_string(),
            duration_seconds: 12.0,
            width: 1920,
            height: 1080,
        })
    }

    #[tokio::test]
    async fn completion_propagates_final_fields_to_the_post() {
        let sink = RecordingPostSink::default();
        let post_id = Uuid::new_v4();

        propagate_post(&sink, post_id, &video_artifacts()).await;

        let applied = sink.applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        let (applied_post, fields) = &applied[0];
        assert_eq!(*applied_post, post_id);
        assert_eq!(fields.media_url, "https://cdn.test/media/u/video/1-a.mp4");
        assert_eq!(
            fields.thumbnail_url.as_deref(),
            Some("https://cdn.test/media/u/thumbnail/1-a.jpg")
        );
        assert_eq!(fields.duration_seconds, 12.0);
        assert_eq!(fields.width, Some(1920));
        assert_eq!(fields.height, Some(1080));
    }

    #[tokio::test]
    async fn propagation_failure_is_swallowed() {
        let sink = RecordingPostSink {
            fail: true,
            ..Default::default()
        };
        // Must not panic or propagate; the job stays completed.
        propagate_post(&sink, Uuid::new_v4(), &video_artifacts()).await;
    }

    #[test]
    fn job_workdir_is_removed_on_drop() {
        let job_id = Uuid::new_v4();
        let dir = job_workdir(job_id).unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.exists());
        std::fs::write(path.join("input.mp4"), b"scratch").unwrap();
        drop(dir);
        assert!(!path.exists());
    }
}
