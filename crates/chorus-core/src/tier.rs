//! Tier policy engine.
//!
//! Pure mapping from a submitter's service tier to processing ceilings and
//! output encoding parameters, plus the validation rules applied to probed
//! metadata. Validation runs against the tier snapshot captured when the job
//! was created, never against the user's live plan.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceTier {
    Free,
    Standard,
    Pro,
}

impl Display for ServiceTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ServiceTier::Free => write!(f, "free"),
            ServiceTier::Standard => write!(f, "standard"),
            ServiceTier::Pro => write!(f, "pro"),
        }
    }
}

impl FromStr for ServiceTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(ServiceTier::Free),
            "standard" => Ok(ServiceTier::Standard),
            "pro" => Ok(ServiceTier::Pro),
            _ => Err(anyhow::anyhow!("Invalid service tier: {}", s)),
        }
    }
}

/// Processing ceilings and output parameters for one tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierLimits {
    pub tier: ServiceTier,
    pub max_video_duration_secs: f64,
    pub max_video_width: u32,
    pub max_video_height: u32,
    pub max_audio_duration_secs: f64,
    pub max_audio_file_bytes: u64,
    /// AAC bitrate for both the video pipeline's audio track and the audio
    /// pipeline's output.
    pub audio_bitrate_kbps: u32,
}

const MB: u64 = 1024 * 1024;

impl ServiceTier {
    pub fn limits(&self) -> TierLimits {
        match self {
            ServiceTier::Free => TierLimits {
                tier: ServiceTier::Free,
                max_video_duration_secs: 30.0,
                max_video_width: 1280,
                max_video_height: 720,
                max_audio_duration_secs: 60.0,
                max_audio_file_bytes: 10 * MB,
                audio_bitrate_kbps: 128,
            },
            ServiceTier::Standard => TierLimits {
                tier: ServiceTier::Standard,
                max_video_duration_secs: 60.0,
                max_video_width: 1920,
                max_video_height: 1080,
                max_audio_duration_secs: 300.0,
                max_audio_file_bytes: 50 * MB,
                audio_bitrate_kbps: 192,
            },
            ServiceTier::Pro => TierLimits {
                tier: ServiceTier::Pro,
                max_video_duration_secs: 300.0,
                max_video_width: 3840,
                max_video_height: 2160,
                max_audio_duration_secs: 1800.0,
                max_audio_file_bytes: 200 * MB,
                audio_bitrate_kbps: 256,
            },
        }
    }
}

impl TierLimits {
    /// Video duration over the ceiling is a hard rejection; duration cannot
    /// be shortened programmatically. Resolution is handled separately by
    /// [`TierLimits::video_target_dimensions`].
    pub fn check_video(&self, duration_secs: f64) -> Result<(), PipelineError> {
        if duration_secs > self.max_video_duration_secs {
            return Err(PipelineError::PolicyViolation(format!(
                "video is {} long, the {} tier allows at most {}",
                format_secs(duration_secs),
                self.tier,
                format_secs(self.max_video_duration_secs),
            )));
        }
        Ok(())
    }

    /// Target dimensions for a source that exceeds the tier's resolution box,
    /// or `None` when the source already fits.
    ///
    /// Aspect ratio is preserved: the dimension whose ratio exceeds the box
    /// binds, the other is derived from it. Both are rounded down to the
    /// nearest even integer (encoders reject odd dimensions).
    pub fn video_target_dimensions(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width <= self.max_video_width && height <= self.max_video_height {
            return None;
        }

        // Integer arithmetic throughout; f64 division introduces sub-pixel
        // jitter on exact-fit sources like 3840x2160 -> 1920x1080.
        let (target_w, target_h) = if (width as u64) * (self.max_video_height as u64)
            >= (height as u64) * (self.max_video_width as u64)
        {
            let w = self.max_video_width;
            let h = ((w as u64) * (height as u64) / (width as u64)) as u32;
            (w, h)
        } else {
            let h = self.max_video_height;
            let w = ((h as u64) * (width as u64) / (height as u64)) as u32;
            (w, h)
        };

        Some((even_floor(target_w), even_floor(target_h)))
    }

    /// Audio duration and file size are both hard rejections; there is no
    /// silent trimming. The size check carries its own message so a
    /// within-duration but oversized file reports the actual cause.
    pub fn check_audio(&self, duration_secs: f64, file_size_bytes: u64) -> Result<(), PipelineError> {
        if duration_secs > self.max_audio_duration_secs {
            return Err(PipelineError::PolicyViolation(format!(
                "audio is {} long, the {} tier allows at most {}",
                format_mm_ss(duration_secs),
                self.tier,
                format_mm_ss(self.max_audio_duration_secs),
            )));
        }
        if file_size_bytes > self.max_audio_file_bytes {
            return Err(PipelineError::PolicyViolation(format!(
                "audio file is {}, the {} tier allows at most {}",
                format_megabytes(file_size_bytes),
                self.tier,
                format_megabytes(self.max_audio_file_bytes),
            )));
        }
        Ok(())
    }
}

fn even_floor(v: u32) -> u32 {
    (v & !1).max(2)
}

/// Whole seconds with an `s` suffix; fractional durations keep one decimal.
fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}s", secs as u64)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Minutes:seconds, e.g. 400.0 -> "6:40".
fn format_mm_ss(secs: f64) -> String {
    let total = secs.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Megabytes with one decimal, trimmed for whole values, e.g. "12.5 MB".
fn format_megabytes(bytes: u64) -> String {
    let mb = bytes as f64 / MB as f64;
    if mb.fract() == 0.0 {
        format!("{} MB", mb as u64)
    } else {
        format!("{:.1} MB", mb)
    }
}
