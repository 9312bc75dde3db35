//! Probed media metadata types

use serde::{Deserialize, Serialize};

/// Video metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub bitrate: Option<u64>,
    pub framerate: Option<f32>,
}

/// Audio metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub duration: f64,
    pub bitrate: Option<i64>,
    pub sample_rate: Option<i32>,
    pub channels: Option<i32>,
    pub codec: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_metadata_serialization_round_trip() {
        let metadata = VideoMetadata {
            duration: 12.5,
            width: 1920,
            height: 1080,
            codec: "h264".to_string(),
            bitrate: Some(4_500_000),
            framerate: Some(29.97),
        };

        let json = serde_json::to_string(&metadata).unwrap();
        let back: VideoMetadata = serde_json::from_str(&json).unwrap();

        assert_eq!(back.duration, metadata.duration);
        assert_eq!(back.width, metadata.width);
        assert_eq!(back.height, metadata.height);
        assert_eq!(back.codec, metadata.codec);
    }

    #[test]
    fn audio_metadata_serialization_round_trip() {
        let metadata = AudioMetadata {
            duration: 90.0,
            bitrate: Some(192_000),
            sample_rate: Some(44_100),
            channels: Some(2),
            codec: Some("aac".to_string()),
        };

        let json = serde_json::to_string(&metadata).unwrap();
        let back: AudioMetadata = serde_json::from_str(&json).unwrap();

        assert_eq!(back.duration, metadata.duration);
        assert_eq!(back.channels, metadata.channels);
    }
}
