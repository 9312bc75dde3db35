//! Audio pipeline: download -> probe -> tier validation -> loudness
//! normalization -> waveform extraction -> upload -> raw cleanup.

pub mod engine;
pub mod waveform;

pub use engine::{AudioEngine, FfmpegAudioEngine, LOUDNORM_FILTER};
pub use waveform::{Waveform, WAVEFORM_PEAKS, WAVEFORM_SAMPLE_RATE};

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use chorus_core::models::{AudioArtifacts, MediaJob};
use chorus_core::PipelineError;
use chorus_storage::{generate_media_key, MediaStore};

use crate::probe::MediaProber;
use crate::progress::{map_stage_progress, ProgressSink};
use crate::util::extension_of;

const PROGRESS_DOWNLOADED: i32 = 15;
const PROGRESS_PROBED: i32 = 20;
const NORMALIZE_LO: i32 = 25;
const NORMALIZE_HI: i32 = 65;
const PROGRESS_WAVEFORM_BUILT: i32 = 80;
const PROGRESS_OUTPUT_UPLOADED: i32 = 90;
const PROGRESS_WAVEFORM_UPLOADED: i32 = 98;

pub struct AudioPipeline {
    store: Arc<dyn MediaStore>,
    prober: Arc<dyn MediaProber>,
    engine: Arc<dyn AudioEngine>,
}

impl AudioPipeline {
    pub fn new(
        store: Arc<dyn MediaStore>,
        prober: Arc<dyn MediaProber>,
        engine: Arc<dyn AudioEngine>,
    ) -> Self {
        Self {
            store,
            prober,
            engine,
        }
    }

    /// Run the full pipeline for one claimed audio job inside `workdir`.
    #[tracing::instrument(skip(self, job, workdir, progress), fields(job_id = %job.id))]
    pub async fn run(
        &self,
        job: &MediaJob,
        workdir: &Path,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<AudioArtifacts, PipelineError> {
        let raw_key = self.store.key_for_url(&job.raw_file_url).ok_or_else(|| {
            PipelineError::Storage(format!(
                "raw file URL is not addressable by the configured store: {}",
                job.raw_file_url
            ))
        })?;

        let data = self.store.download(&raw_key).await?;
        let raw_size = data.len() as u64;
        let source_ext = extension_of(&raw_key).unwrap_or_else(|| "bin".to_string());
        let input_path = workdir.join(format!("input.{}", source_ext));
        tokio::fs::write(&input_path, &data).await?;
        progress.report(PROGRESS_DOWNLOADED).await;

        let meta = self.prober.probe_audio(&input_path).await?;
        progress.report(PROGRESS_PROBED).await;

        let limits = job.user_tier.limits();
        limits.check_audio(meta.duration, raw_size)?;

        let normalized_path = workdir.join("normalized.m4a");
        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let sink = Arc::clone(&progress);
        let forward = tokio::spawn(async move {
            while let Some(fraction) = rx.recv().await {
                sink.report(map_stage_progress(fraction, NORMALIZE_LO, NORMALIZE_HI))
                    .await;
            }
        });

        let result = self
            .engine
            .normalize(
                &input_path,
                &normalized_path,
                limits.audio_bitrate_kbps,
                meta.duration,
                tx,
            )
            .await;
        forward.await.ok();
        result?;

        let samples = self
            .engine
            .extract_samples(&normalized_path, WAVEFORM_SAMPLE_RATE)
            .await?;
        let waveform = Waveform::from_samples(&samples, meta.duration);
        progress.report(PROGRESS_WAVEFORM_BUILT).await;

        let audio_bytes = tokio::fs::read(&normalized_path).await?;
        let audio_key = generate_media_key(job.user_id, "audio", "m4a");
        let output_url = self
            .store
            .upload(&audio_key, audio_bytes, "audio/mp4")
            .await?;
        progress.report(PROGRESS_OUTPUT_UPLOADED).await;

        let waveform_bytes = serde_json::to_vec(&waveform).map_err(|e| {
            PipelineError::Storage(format!("failed to encode waveform artifact: {}", e))
        })?;
        let waveform_key = generate_media_key(job.user_id, "waveform", "json");
        let waveform_url = self
            .store
            .upload(&waveform_key, waveform_bytes, "application/json")
            .await?;
        progress.report(PROGRESS_WAVEFORM_UPLOADED).await;

        if let Err(e) = self.store.delete(&raw_key).await {
            tracing::warn!(key = %raw_key, error = %e, "Failed to delete raw upload, leaving it behind");
        }

        Ok(AudioArtifacts {
            output_url,
            waveform_url,
            duration_seconds: meta.duration,
        })
    }
}
