//! Pipeline error taxonomy.
//!
//! Every pipeline-stage failure is caught at the worker-loop boundary and
//! converted into a single failure write; the variant determines the
//! human-readable `error_message` a submitter sees when polling the job.

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A tier ceiling was exceeded. Deterministic; resubmitting the same
    /// file under the same tier fails identically.
    #[error("{0}")]
    PolicyViolation(String),

    /// The file had no decodable stream or ffprobe could not read it.
    #[error("failed to probe media: {0}")]
    Probe(String),

    /// A transcode, normalize, or thumbnail invocation failed; carries the
    /// engine's own message.
    #[error("media engine failed: {0}")]
    Engine(String),

    /// Object-store download/upload failure. A raw-delete failure is
    /// downgraded to a warning before reaching this type.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, PipelineError::PolicyViolation(_))
    }
}
