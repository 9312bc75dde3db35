//! Content-record propagation hook.
//!
//! On successful completion of a job whose `post_id` is set, the worker
//! pushes the final media fields into the platform's post record. The write
//! is fire-and-forget relative to the job's own completion update: it is not
//! transactional with it, and a failure is logged without failing the job.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{JobArtifacts, PostMediaFields};

#[async_trait]
pub trait PostMediaSink: Send + Sync {
    /// Write the job's final media fields into the referenced post.
    async fn apply(&self, post_id: Uuid, fields: &PostMediaFields) -> anyhow::Result<()>;
}

impl From<&JobArtifacts> for PostMediaFields {
    fn from(artifacts: &JobArtifacts) -> Self {
        match artifacts {
            JobArtifacts::Video(v) => PostMediaFields {
                media_url: v.output_url.clone(),
                thumbnail_url: Some(v.thumbnail_url.clone()),
                duration_seconds: v.duration_seconds,
                width: Some(v.width),
                height: Some(v.height),
            },
            JobArtifacts::Audio(a) => PostMediaFields {
                media_url: a.output_url.clone(),
                thumbnail_url: None,
                duration_seconds: a.duration_seconds,
                width: None,
                height: None,
            },
        }
    }
}

/// Sink that drops every update. Useful for deployments where the post
/// record is maintained by another service, and as a test placeholder.
pub struct NoOpPostSink;

#[async_trait]
impl PostMediaSink for NoOpPostSink {
    async fn apply(&self, _post_id: Uuid, _fields: &PostMediaFields) -> anyhow::Result<()> {
        Ok(())
    }
}
