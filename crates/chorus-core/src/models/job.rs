use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::tier::ServiceTier;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Video,
    Audio,
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
        }
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Reserved for the platform's submitter-facing surface; the worker
    /// never sets it.
    Cancelled,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// One media-processing job row.
///
/// Rows are created by the platform's upload-finalization layer in state
/// `pending` and mutated only by workers afterwards. `user_tier` is the tier
/// snapshot taken at submission; validation always runs against it, never
/// against the user's live tier. `attempt` is the fencing token: every
/// successful claim increments it, and every later write for that claim is
/// conditional on it, so a worker superseded by a stale reclaim cannot
/// overwrite the newer attempt's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaJob {
    pub id: Uuid,
    pub media_type: MediaType,
    pub status: JobStatus,
    pub raw_file_url: String,
    pub raw_file_size: i64,
    pub user_id: Uuid,
    pub user_tier: ServiceTier,
    pub post_id: Option<Uuid>,
    pub progress: i32,
    pub attempt: i32,
    pub output_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub waveform_url: Option<String>,
    pub duration_seconds: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for MediaJob {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(MediaJob {
            id: row.get("id"),
            media_type: row.get::<String, _>("media_type").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse media_type: {}", e).into())
            })?,
            status: row.get::<String, _>("status").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse status: {}", e).into())
            })?,
            raw_file_url: row.get("raw_file_url"),
            raw_file_size: row.get("raw_file_size"),
            user_id: row.get("user_id"),
            user_tier: row.get::<String, _>("user_tier").parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse user_tier: {}", e).into())
            })?,
            post_id: row.get("post_id"),
            progress: row.get("progress"),
            attempt: row.get("attempt"),
            output_url: row.get("output_url"),
            thumbnail_url: row.get("thumbnail_url"),
            waveform_url: row.get("waveform_url"),
            duration_seconds: row.get("duration_seconds"),
            width: row.get("width"),
            height: row.get("height"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            processed_at: row.get("processed_at"),
        })
    }
}

/// A claimed job plus the submitter identity joined in by the claim query.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub job: MediaJob,
    pub username: Option<String>,
}

/// Final artifacts of a successful video run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoArtifacts {
    pub output_url: String,
    pub thumbnail_url: String,
    pub duration_seconds: f64,
    pub width: i32,
    pub height: i32,
}

/// Final artifacts of a successful audio run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioArtifacts {
    pub output_url: String,
    pub waveform_url: String,
    pub duration_seconds: f64,
}

/// Tagged result of a pipeline run, persisted by the completion write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobArtifacts {
    Video(VideoArtifacts),
    Audio(AudioArtifacts),
}

impl JobArtifacts {
    pub fn output_url(&self) -> &str {
        match self {
            JobArtifacts::Video(v) => &v.output_url,
            JobArtifacts::Audio(a) => &a.output_url,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        match self {
            JobArtifacts::Video(v) => v.duration_seconds,
            JobArtifacts::Audio(a) => a.duration_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_display_round_trip() {
        assert_eq!(MediaType::Video.to_string(), "video");
        assert_eq!(MediaType::Audio.to_string(), "audio");
        assert_eq!("video".parse::<MediaType>().unwrap(), MediaType::Video);
        assert_eq!("audio".parse::<MediaType>().unwrap(), MediaType::Audio);
        assert!("image".parse::<MediaType>().is_err());
    }

    #[test]
    fn job_status_display_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("queued".parse::<JobStatus>().is_err());
    }

    #[test]
    fn artifacts_accessors() {
        let artifacts = JobArtifacts::Audio(AudioArtifacts {
            output_url: "https://cdn.example.com/a.m4a".to_string(),
            waveform_url: "https://cdn.example.com/a.json".to_string(),
            duration_seconds: 42.5,
        });
        assert_eq!(artifacts.output_url(), "https://cdn.example.com/a.m4a");
        assert_eq!(artifacts.duration_seconds(), 42.5);
    }
}
