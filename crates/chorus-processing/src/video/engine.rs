//! ffmpeg adapter for the video pipeline: resolution-constrained re-encode
//! and thumbnail extraction.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tokio::sync::mpsc;

use chorus_core::PipelineError;

use crate::ffmpeg::{run_capturing, run_with_progress};

#[async_trait]
pub trait VideoEngine: Send + Sync {
    /// Re-encode to exactly `target_width` x `target_height`, letterboxing to
    /// preserve the source aspect ratio, with the audio track re-encoded at
    /// `audio_bitrate_kbps`. Completion fractions stream to `progress` for
    /// the duration of the call.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        target_width: u32,
        target_height: u32,
        audio_bitrate_kbps: u32,
        duration_secs: f64,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<(), PipelineError>;

    /// Extract a single frame at `timestamp_secs` as a JPEG.
    async fn extract_thumbnail(
        &self,
        input: &Path,
        output: &Path,
        timestamp_secs: f64,
    ) -> Result<(), PipelineError>;
}

pub struct FfmpegVideoEngine {
    ffmpeg_path: String,
}

impl FfmpegVideoEngine {
    pub fn new(ffmpeg_path: String) -> Self {
        Self { ffmpeg_path }
    }
}

/// Downscale into the target box, then pad out to the exact dimensions so
/// nothing is cropped.
fn scale_pad_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = width,
        h = height
    )
}

fn transcode_args(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    audio_bitrate_kbps: u32,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vf".to_string(),
        scale_pad_filter(width, height),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-profile:v".to_string(),
        "main".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", audio_bitrate_kbps),
        "-ac".to_string(),
        "2".to_string(),
        "-ar".to_string(),
        "48000".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

#[async_trait]
impl VideoEngine for FfmpegVideoEngine {
    #[tracing::instrument(skip(self, input, output, progress))]
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        target_width: u32,
        target_height: u32,
        audio_bitrate_kbps: u32,
        duration_secs: f64,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<(), PipelineError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(transcode_args(
            input,
            output,
            target_width,
            target_height,
            audio_bitrate_kbps,
        ));

        run_with_progress(cmd, duration_secs, progress).await
    }

    #[tracing::instrument(skip(self, input, output))]
    async fn extract_thumbnail(
        &self,
        input: &Path,
        output: &Path,
        timestamp_secs: f64,
    ) -> Result<(), PipelineError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-y")
            .arg("-ss")
            .arg(format!("{:.3}", timestamp_secs))
            .arg("-i")
            .arg(input)
            .args(["-frames:v", "1", "-q:v", "2", "-loglevel", "error"])
            .arg(output);

        run_capturing(cmd).await.map(|_| ())
    }
}
