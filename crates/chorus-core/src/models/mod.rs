pub mod job;
pub mod post;

pub use job::{
    AudioArtifacts, ClaimedJob, JobArtifacts, JobStatus, MediaJob, MediaType, VideoArtifacts,
};
pub use post::PostMediaFields;
