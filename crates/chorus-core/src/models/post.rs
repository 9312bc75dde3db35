use serde::{Deserialize, Serialize};

/// Media fields written into a post record when the job that produced them
/// completes. Video jobs populate every field; audio jobs leave the
/// thumbnail and dimensions empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMediaFields {
    pub media_url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: f64,
    pub width: Option<i32>,
    pub height: Option<i32>,
}
