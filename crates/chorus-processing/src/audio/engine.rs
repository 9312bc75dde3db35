//! ffmpeg adapter for the audio pipeline: loudness normalization and raw
//! sample extraction for waveform computation.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tokio::sync::mpsc;

use chorus_core::PipelineError;

use crate::ffmpeg::{run_capturing, run_with_progress};

/// Broadcast loudness target: integrated -16 LUFS, true peak -1.5 dBTP,
/// loudness range 11 LU.
pub const LOUDNORM_FILTER: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Loudness-normalize and re-encode to AAC at `audio_bitrate_kbps` in a
    /// faststart MP4 container. Completion fractions stream to `progress`.
    async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        audio_bitrate_kbps: u32,
        duration_secs: f64,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<(), PipelineError>;

    /// Decode `input` to mono f32 samples at `sample_rate` Hz.
    async fn extract_samples(
        &self,
        input: &Path,
        sample_rate: u32,
    ) -> Result<Vec<f32>, PipelineError>;
}

pub struct FfmpegAudioEngine {
    ffmpeg_path: String,
}

impl FfmpegAudioEngine {
    pub fn new(ffmpeg_path: String) -> Self {
        Self { ffmpeg_path }
    }
}

fn normalize_args(input: &Path, output: &Path, audio_bitrate_kbps: u32) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vn".to_string(),
        "-af".to_string(),
        LOUDNORM_FILTER.to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", audio_bitrate_kbps),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        "mp4".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Little-endian f32 samples from an ffmpeg `-f f32le` byte stream.
fn samples_from_f32le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[async_trait]
impl AudioEngine for FfmpegAudioEngine {
    #[tracing::instrument(skip(self, input, output, progress))]
    async fn normalize(
        &self,
        input: &Path,
        output: &Path,
        audio_bitrate_kbps: u32,
        duration_secs: f64,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<(), PipelineError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(normalize_args(input, output, audio_bitrate_kbps));

        run_with_progress(cmd, duration_secs, progress).await
    }

    #[tracing::instrument(skip(self, input))]
    async fn extract_samples(
        &self,
        input: &Path,
        sample_rate: u32,
    ) -> Result<Vec<f32>, PipelineError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-i")
            .arg(input)
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(sample_rate.to_string())
            .args(["-f", "f32le", "-loglevel", "error", "pipe:1"]);

        let stdout = run_capturing(cmd).await?;
        Ok(samples_from_f32le(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn loudnorm_filter_matches_broadcast_target() {
        assert_eq!(LOUDNORM_FILTER, "loudnorm=I=-16:TP=-1.5:LRA=11");
    }

    #[test]
    fn normalize_args_strip_video_and_set_bitrate() {
        let args = normalize_args(
            &PathBuf::from("/tmp/in.wav"),
            &PathBuf::from("/tmp/out.m4a"),
            128,
        );
        assert!(args.contains(&"-vn".to_string()));
        assert!(args.contains(&"128k".to_string()));
        assert!(args.contains(&LOUDNORM_FILTER.to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }

    #[test]
    fn f32le_bytes_decode_in_order() {
        let mut bytes = Vec::new();
        for v in [0.0f32, 0.5, -1.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(samples_from_f32le(&bytes), vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn trailing_partial_sample_dropped() {
        let mut bytes = 1.0f32.to_le_bytes().to_vec();
        bytes.push(0xAB);
        assert_eq!(samples_from_f32le(&bytes), vec![1.0]);
    }
}
