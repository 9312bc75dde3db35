//! Media metadata prober backed by ffprobe.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

use chorus_core::PipelineError;

use crate::metadata::{AudioMetadata, VideoMetadata};

/// Technical-metadata extraction from a local media file, without decoding
/// the stream. Behind a trait so the pipelines are testable with a fake.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe_video(&self, path: &Path) -> Result<VideoMetadata, PipelineError>;
    async fn probe_audio(&self, path: &Path) -> Result<AudioMetadata, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<i32>,
}

pub struct FfprobeProber {
    ffprobe_path: String,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: String) -> Self {
        Self { ffprobe_path }
    }

    async fn run_ffprobe(&self, path: &Path) -> Result<FfprobeOutput, PipelineError> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .await
            .map_err(|e| PipelineError::Probe(format!("failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Probe(stderr.trim().to_string()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| PipelineError::Probe(format!("failed to parse ffprobe output: {}", e)))
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    #[tracing::instrument(skip(self))]
    async fn probe_video(&self, path: &Path) -> Result<VideoMetadata, PipelineError> {
        let start = std::time::Instant::now();
        let probed = self.run_ffprobe(path).await?;

        let duration = parse_duration(&probed)?;

        let stream = probed
            .streams
            .unwrap_or_default()
            .into_iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| PipelineError::Probe("no video stream found".to_string()))?;

        let width = stream
            .width
            .ok_or_else(|| PipelineError::Probe("could not parse width".to_string()))?;
        let height = stream
            .height
            .ok_or_else(|| PipelineError::Probe("could not parse height".to_string()))?;

        let codec = stream.codec_name.unwrap_or_else(|| "unknown".to_string());

        let bitrate = probed
            .format
            .as_ref()
            .and_then(|f| f.bit_rate.as_ref())
            .and_then(|b| b.parse::<u64>().ok());

        let framerate = stream.r_frame_rate.as_deref().and_then(parse_frame_rate);

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            video_duration = duration,
            width = width,
            height = height,
            codec = %codec,
            "Video probe completed"
        );

        Ok(VideoMetadata {
            duration,
            width,
            height,
            codec,
            bitrate,
            framerate,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn probe_audio(&self, path: &Path) -> Result<AudioMetadata, PipelineError> {
        let probed = self.run_ffprobe(path).await?;

        let duration = parse_duration(&probed)?;

        let bitrate = probed
            .format
            .as_ref()
            .and_then(|f| f.bit_rate.as_ref())
            .and_then(|b| b.parse::<i64>().ok());

        let stream = probed
            .streams
            .unwrap_or_default()
            .into_iter()
            .find(|s| s.codec_type.as_deref() == Some("audio"))
            .ok_or_else(|| PipelineError::Probe("no audio stream found".to_string()))?;

        let sample_rate = stream
            .sample_rate
            .as_ref()
            .and_then(|sr| sr.parse::<i32>().ok());

        tracing::info!(
            audio_duration = duration,
            sample_rate = ?sample_rate,
            channels = ?stream.channels,
            "Audio probe completed"
        );

        Ok(AudioMetadata {
            duration,
            bitrate,
            sample_rate,
            channels: stream.channels,
            codec: stream.codec_name,
        })
    }
}

fn parse_duration(probed: &FfprobeOutput) -> Result<f64, PipelineError> {
    probed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| PipelineError::Probe("could not parse duration".to_string()))
}

/// ffprobe reports frame rate as a fraction, e.g. "30000/1001".
fn parse_frame_rate(raw: &str) -> Option<f32> {
    let (num, den) = raw.split_once('/')?;
    let num: f32 = num.parse().ok()?;
    let den: f32 = den.parse().ok()?;
    if den != 0.0 {
        Some(num / den)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_fraction_parsed() {
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("30000/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }

    #[test]
    fn ffprobe_json_maps_to_video_metadata_fields() {
        let raw = r#"{
            "format": {"duration": "45.000000", "bit_rate": "4500000"},
            "streams": [
                {"codec_type": "audio", "codec_name": "aac", "sample_rate": "48000", "channels": 2},
                {"codec_type": "video", "codec_name": "h264", "width": 3840, "height": 2160, "r_frame_rate": "25/1"}
            ]
        }"#;
        let probed: FfprobeOutput = serde_json::from_str(raw).unwrap();

        assert_eq!(parse_duration(&probed).unwrap(), 45.0);
        let stream = probed
            .streams
            .unwrap()
            .into_iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .unwrap();
        assert_eq!(stream.width, Some(3840));
        assert_eq!(stream.height, Some(2160));
    }

    #[test]
    fn missing_duration_is_a_probe_error() {
        let raw = r#"{"format": {}, "streams": []}"#;
        let probed: FfprobeOutput = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            parse_duration(&probed),
            Err(PipelineError::Probe(_))
        ));
    }
}
