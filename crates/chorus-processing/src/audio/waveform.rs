//! Waveform reduction: downsample an audio signal's sample stream into a
//! fixed-length peak envelope for client-side visualization.

use serde::{Deserialize, Serialize};

/// Number of peak buckets in the published waveform.
pub const WAVEFORM_PEAKS: usize = 200;

/// Sample rate the normalized output is re-decoded at before reduction.
pub const WAVEFORM_SAMPLE_RATE: u32 = 8_000;

/// The waveform artifact uploaded next to the normalized audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waveform {
    pub peaks: Vec<f32>,
    pub duration_seconds: f64,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn from_samples(samples: &[f32], duration_seconds: f64) -> Self {
        Self {
            peaks: reduce_peaks(samples, WAVEFORM_PEAKS),
            duration_seconds,
            sample_rate: WAVEFORM_SAMPLE_RATE,
        }
    }
}

/// Partition `samples` into exactly `bucket_count` near-equal buckets and
/// record the maximum absolute value per bucket, clamped to [0, 1].
///
/// Always returns `bucket_count` peaks; buckets with no samples (input
/// shorter than the bucket count) report 0.0.
pub fn reduce_peaks(samples: &[f32], bucket_count: usize) -> Vec<f32> {
    (0..bucket_count)
        .map(|i| {
            let start = i * samples.len() / bucket_count;
            let end = (i + 1) * samples.len() / bucket_count;
            samples[start..end]
                .iter()
                .map(|s| s.abs().min(1.0))
                .fold(0.0f32, f32::max)
        })
        .collect()
}
