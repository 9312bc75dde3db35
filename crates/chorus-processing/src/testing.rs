//! In-memory fakes for the pipeline seams, used by the pipeline tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use chorus_core::models::{JobStatus, MediaJob, MediaType};
use chorus_core::{PipelineError, ServiceTier, StorageBackend};
use chorus_storage::{MediaStore, StorageError, StorageResult};

use crate::audio::engine::AudioEngine;
use crate::metadata::{AudioMetadata, VideoMetadata};
use crate::probe::MediaProber;
use crate::progress::ProgressSink;
use crate::video::engine::VideoEngine;

pub(crate) const MOCK_BASE_URL: &str = "https://cdn.test";

#[derive(Default)]
pub(crate) struct MockStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_downloads: bool,
    pub fail_uploads: bool,
    pub fail_deletes: bool,
}

impl MockStore {
    pub fn with_object(key: &str, data: &[u8]) -> Self {
        let store = Self::default();
        store
            .objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        store
    }
}

#[async_trait]
impl MediaStore for MockStore {
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        if self.fail_downloads {
            return Err(StorageError::DownloadFailed("injected".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn upload(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        if self.fail_uploads {
            return Err(StorageError::UploadFailed("injected".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), data);
        Ok(self.public_url(storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        if self.fail_deletes {
            return Err(StorageError::DeleteFailed("injected".to_string()));
        }
        self.objects.lock().unwrap().remove(storage_key);
        self.deleted.lock().unwrap().push(storage_key.to_string());
        Ok(())
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", MOCK_BASE_URL, storage_key)
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&format!("{}/", MOCK_BASE_URL))
            .map(str::to_string)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

pub(crate) struct MockProber {
    pub video: Option<VideoMetadata>,
    pub audio: Option<AudioMetadata>,
}

impl MockProber {
    pub fn video(meta: VideoMetadata) -> Self {
        Self {
            video: Some(meta),
            audio: None,
        }
    }

    pub fn audio(meta: AudioMetadata) -> Self {
        Self {
            video: None,
            audio: Some(meta),
        }
    }

    pub fn failing() -> Self {
        Self {
            video: None,
            audio: None,
        }
    }
}

#[async_trait]
impl MediaProber for MockProber {
    async fn probe_video(&self, _path: &Path) -> Result<VideoMetadata, PipelineError> {
        self.video
            .clone()
            .ok_or_else(|| PipelineError::Probe("no video stream found".to_string()))
    }

    async fn probe_audio(&self, _path: &Path) -> Result<AudioMetadata, PipelineError> {
        self.audio
            .clone()
            .ok_or_else(|| PipelineError::Probe("no audio stream found".to_string()))
    }
}

#[derive(Default)]
pub(crate) struct MockVideoEngine {
    pub transcodes: Mutex<Vec<(u32, u32)>>,
    pub thumbnails: Mutex<u32>,
    pub fail_transcode: bool,
    pub fail_thumbnail: bool,
}

#[async_trait]
impl VideoEngine for MockVideoEngine {
    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        target_width: u32,
        target_height: u32,
        _audio_bitrate_kbps: u32,
        _duration_secs: f64,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<(), PipelineError> {
        if self.fail_transcode {
            return Err(PipelineError::Engine("transcode injected".to_string()));
        }
        let _ = progress.send(0.5);
        let _ = progress.send(1.0);
        tokio::fs::write(output, b"transcoded").await?;
        self.transcodes
            .lock()
            .unwrap()
            .push((target_width, target_height));
        Ok(())
    }

    async fn extract_thumbnail(
        &self,
        _input: &Path,
        output: &Path,
        _timestamp_secs: f64,
    ) -> Result<(), PipelineError> {
        if self.fail_thumbnail {
            return Err(PipelineError::Engine("thumbnail injected".to_string()));
        }
        tokio::fs::write(output, b"jpeg").await?;
        *self.thumbnails.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockAudioEngine {
    pub normalizations: Mutex<u32>,
    pub fail_normalize: bool,
    pub samples: Vec<f32>,
}

#[async_trait]
impl AudioEngine for MockAudioEngine {
    async fn normalize(
        &self,
        _input: &Path,
        output: &Path,
        _audio_bitrate_kbps: u32,
        _duration_secs: f64,
        progress: mpsc::UnboundedSender<f64>,
    ) -> Result<(), PipelineError> {
        if self.fail_normalize {
            return Err(PipelineError::Engine("normalize injected".to_string()));
        }
        let _ = progress.send(0.5);
        let _ = progress.send(1.0);
        tokio::fs::write(output, b"normalized").await?;
        *self.normalizations.lock().unwrap() += 1;
        Ok(())
    }

    async fn extract_samples(
        &self,
        _input: &Path,
        _sample_rate: u32,
    ) -> Result<Vec<f32>, PipelineError> {
        Ok(self.samples.clone())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub reports: Mutex<Vec<i32>>,
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn report(&self, percent: i32) {
        self.reports.lock().unwrap().push(percent);
    }
}

pub(crate) fn test_job(media_type: MediaType, tier: ServiceTier, raw_key: &str) -> MediaJob {
    let now = chrono::Utc::now();
    MediaJob {
        id: Uuid::new_v4(),
        media_type,
        status: JobStatus::Processing,
        raw_file_url: format!("{}/{}", MOCK_BASE_URL, raw_key),
        raw_file_size: 1024,
        user_id: Uuid::new_v4(),
        user_tier: tier,
        post_id: None,
        progress: 0,
        attempt: 1,
        output_url: None,
        thumbnail_url: None,
        waveform_url: None,
        duration_seconds: None,
        width: None,
        height: None,
        error_message: None,
        created_at: now,
        updated_at: now,
        processed_at: None,
    }
}
