//! Video pipeline: download -> probe -> tier validation -> conditional
//! downscale -> thumbnail -> upload -> raw cleanup.

pub mod engine;

pub use engine::{FfmpegVideoEngine, VideoEngine};

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use chorus_core::models::{MediaJob, VideoArtifacts};
use chorus_core::PipelineError;
use chorus_storage::{generate_media_key, MediaStore};

use crate::probe::MediaProber;
use crate::progress::{map_stage_progress, ProgressSink};
use crate::util::extension_of;

const PROGRESS_DOWNLOADED: i32 = 15;
const PROGRESS_PROBED: i32 = 20;
const TRANSCODE_LO: i32 = 20;
const TRANSCODE_HI: i32 = 80;
const PROGRESS_THUMBNAILED: i32 = 85;
const PROGRESS_OUTPUT_UPLOADED: i32 = 92;
const PROGRESS_THUMBNAIL_UPLOADED: i32 = 98;

pub struct VideoPipeline {
    store: Arc<dyn MediaStore>,
    prober: Arc<dyn MediaProber>,
    engine: Arc<dyn VideoEngine>,
}

impl VideoPipeline {
    pub fn new(
        store: Arc<dyn MediaStore>,
        prober: Arc<dyn MediaProber>,
        engine: Arc<dyn VideoEngine>,
    ) -> Self {
        Self {
            store,
            prober,
            engine,
        }
    }

    /// Run the full pipeline for one claimed video job inside `workdir`.
    ///
    /// The caller owns `workdir` and deletes it whether this returns Ok or
    /// Err; nothing here outlives the call except the uploaded artifacts.
    #[tracing::instrument(skip(self, job, workdir, progress), fields(job_id = %job.id))]
    pub async fn run(
        &self,
        job: &MediaJob,
        workdir: &Path,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<VideoArtifacts, PipelineError> {
        let raw_key = self.store.key_for_url(&job.raw_file_url).ok_or_else(|| {
            PipelineError::Storage(format!(
                "raw file URL is not addressable by the configured store: {}",
                job.raw_file_url
            ))
        })?;

        let data = self.store.download(&raw_key).await?;
        let source_ext = extension_of(&raw_key).unwrap_or_else(|| "mp4".to_string());
        let input_path = workdir.join(format!("input.{}", source_ext));
        tokio::fs::write(&input_path, &data).await?;
        progress.report(PROGRESS_DOWNLOADED).await;

        let meta = self.prober.probe_video(&input_path).await?;
        progress.report(PROGRESS_PROBED).await;

        let limits = job.user_tier.limits();
        limits.check_video(meta.duration)?;

        let (render_path, final_width, final_height, output_ext) =
            match limits.video_target_dimensions(meta.width, meta.height) {
                Some((target_w, target_h)) => {
                    tracing::info!(
                        source_width = meta.width,
                        source_height = meta.height,
                        target_width = target_w,
                        target_height = target_h,
                        "Source exceeds tier resolution, downscaling"
                    );

                    let output = workdir.join("transcoded.mp4");
                    let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
                    let sink = Arc::clone(&progress);
                    let forward = tokio::spawn(async move {
                        while let Some(fraction) = rx.recv().await {
                            sink.report(map_stage_progress(fraction, TRANSCODE_LO, TRANSCODE_HI))
                                .await;
                        }
                    });

                    let result = self
                        .engine
                        .transcode(
                            &input_path,
                            &output,
                            target_w,
                            target_h,
                            limits.audio_bitrate_kbps,
                            meta.duration,
                            tx,
                        )
                        .await;
                    forward.await.ok();
                    result?;

                    (output, target_w as i32, target_h as i32, "mp4".to_string())
                }
                None => (
                    input_path.clone(),
                    meta.width as i32,
                    meta.height as i32,
                    source_ext,
                ),
            };

        let thumbnail_path = workdir.join("thumbnail.jpg");
        self.engine
            .extract_thumbnail(&render_path, &thumbnail_path, thumbnail_timestamp(meta.duration))
            .await?;
        progress.report(PROGRESS_THUMBNAILED).await;

        let video_bytes = tokio::fs::read(&render_path).await?;
        let video_key = generate_media_key(job.user_id, "video", &output_ext);
        let output_url = self
            .store
            .upload(&video_key, video_bytes, video_content_type(&output_ext))
            .await?;
        progress.report(PROGRESS_OUTPUT_UPLOADED).await;

        let thumbnail_bytes = tokio::fs::read(&thumbnail_path).await?;
        let thumbnail_key = generate_media_key(job.user_id, "thumbnail", "jpg");
        let thumbnail_url = self
            .store
            .upload(&thumbnail_key, thumbnail_bytes, "image/jpeg")
            .await?;
        progress.report(PROGRESS_THUMBNAIL_UPLOADED).await;

        if let Err(e) = self.store.delete(&raw_key).await {
            tracing::warn!(key = %raw_key, error = %e, "Failed to delete raw upload, leaving it behind");
        }

        Ok(VideoArtifacts {
            output_url,
            thumbnail_url,
            duration_seconds: meta.duration,
            width: final_width,
            height: final_height,
        })
    }
}

/// Thumbnail timestamp: one second in, or the midpoint of clips shorter
/// than two seconds.
fn thumbnail_timestamp(duration_secs: f64) -> f64 {
    (duration_secs / 2.0).min(1.0).max(0.0)
}

fn video_content_type(ext: &str) -> &'static str {
    match ext {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::VideoMetadata;
    use crate::testing::{test_job, MockProber, MockStore, MockVideoEngine, RecordingSink};
    use chorus_core::models::MediaType;
    use chorus_core::ServiceTier;
    use tempfile::TempDir;

    const RAW_KEY: &str = "media/u/raw/1-abc.mp4";

    fn hd_metadata() -> VideoMetadata {
        VideoMetadata {
            duration: 12.0,
            width: 1280,
            height: 720,
            codec: "h264".to_string(),
            bitrate: Some(2_000_000),
            framerate: Some(30.0),
        }
    }

    fn uhd_metadata() -> VideoMetadata {
        VideoMetadata {
            duration: 45.0,
            width: 3840,
            height: 2160,
            codec: "h264".to_string(),
            bitrate: Some(12_000_000),
            framerate: Some(30.0),
        }
    }

    fn pipeline(
        store: Arc<MockStore>,
        prober: MockProber,
        engine: Arc<MockVideoEngine>,
    ) -> VideoPipeline {
        VideoPipeline::new(store, Arc::new(prober), engine)
    }

    #[tokio::test]
    async fn in_limit_source_skips_transcode_and_keeps_probed_dimensions() {
        let store = Arc::new(MockStore::with_object(RAW_KEY, b"raw video"));
        let engine = Arc::new(MockVideoEngine::default());
        let sink = Arc::new(RecordingSink::default());
        let workdir = TempDir::new().unwrap();
        let job = test_job(MediaType::Video, ServiceTier::Free, RAW_KEY);

        let artifacts = pipeline(store.clone(), MockProber::video(hd_metadata()), engine.clone())
            .run(&job, workdir.path(), sink.clone())
            .await
            .unwrap();

        assert!(engine.transcodes.lock().unwrap().is_empty());
        assert_eq!(*engine.thumbnails.lock().unwrap(), 1);
        assert_eq!(artifacts.width, 1280);
        assert_eq!(artifacts.height, 720);
        assert_eq!(artifacts.duration_seconds, 12.0);
        assert!(artifacts.output_url.starts_with("https://cdn.test/media/"));
        assert!(artifacts.thumbnail_url.contains("/thumbnail/"));

        // Raw source removed after successful upload.
        assert_eq!(store.deleted.lock().unwrap().as_slice(), [RAW_KEY]);

        let reports = sink.reports.lock().unwrap().clone();
        assert_eq!(reports, vec![15, 20, 85, 92, 98]);
    }

    #[tokio::test]
    async fn oversized_source_downscales_with_engine_progress_in_range() {
        let store = Arc::new(MockStore::with_object(RAW_KEY, b"raw video"));
        let engine = Arc::new(MockVideoEngine::default());
        let sink = Arc::new(RecordingSink::default());
        let workdir = TempDir::new().unwrap();
        let job = test_job(MediaType::Video, ServiceTier::Standard, RAW_KEY);

        let artifacts = pipeline(store, MockProber::video(uhd_metadata()), engine.clone())
            .run(&job, workdir.path(), sink.clone())
            .await
            .unwrap();

        assert_eq!(engine.transcodes.lock().unwrap().as_slice(), [(1920, 1080)]);
        assert_eq!(artifacts.width, 1920);
        assert_eq!(artifacts.height, 1080);

        // Engine fractions 0.5 and 1.0 land inside the 20..80 range.
        let reports = sink.reports.lock().unwrap().clone();
        assert!(reports.contains(&50));
        assert!(reports.contains(&80));
    }

    #[tokio::test]
    async fn over_duration_source_fails_before_any_engine_work() {
        let store = Arc::new(MockStore::with_object(RAW_KEY, b"raw video"));
        let engine = Arc::new(MockVideoEngine::default());
        let workdir = TempDir::new().unwrap();
        // 45s source against the free tier's 30s ceiling.
        let job = test_job(MediaType::Video, ServiceTier::Free, RAW_KEY);

        let err = pipeline(store, MockProber::video(uhd_metadata()), engine.clone())
            .run(&job, workdir.path(), Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();

        assert!(err.is_policy_violation());
        assert!(err.to_string().contains("45s"));
        assert!(err.to_string().contains("30s"));
        assert!(engine.transcodes.lock().unwrap().is_empty());
        assert_eq!(*engine.thumbnails.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn probe_failure_propagates() {
        let store = Arc::new(MockStore::with_object(RAW_KEY, b"not video"));
        let workdir = TempDir::new().unwrap();
        let job = test_job(MediaType::Video, ServiceTier::Free, RAW_KEY);

        let err = pipeline(store, MockProber::failing(), Arc::new(MockVideoEngine::default()))
            .run(&job, workdir.path(), Arc::new(RecordingSink::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Probe(_)));
    }

    #[tokio::test]
    async fn upload_failure_fails_the_job() {
        let mut store = MockStore::with_object(RAW_KEY, b"raw video");
        store.fail_uploads = true;
        let workdir = TempDir::new().unwrap();
        let job = test_job(MediaType::Video, ServiceTier::Free, RAW_KEY);

        let err = pipeline(
            Arc::new(store),
            MockProber::video(hd_metadata()),
            Arc::new(MockVideoEngine::default()),
        )
        .run(&job, workdir.path(), Arc::new(RecordingSink::default()))
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::Storage(_)));
    }

    #[tokio::test]
    async fn raw_delete_failure_does_not_fail_the_job() {
        let mut store = MockStore::with_object(RAW_KEY, b"raw video");
        store.fail_deletes = true;
        let workdir = TempDir::new().unwrap();
        let job = test_job(MediaType::Video, ServiceTier::Free, RAW_KEY);

        let result = pipeline(
            Arc::new(store),
            MockProber::video(hd_metadata()),
            Arc::new(MockVideoEngine::default()),
        )
        .run(&job, workdir.path(), Arc::new(RecordingSink::default()))
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn foreign_raw_url_is_a_storage_error() {
        let store = Arc::new(MockStore::default());
        let workdir = TempDir::new().unwrap();
        let mut job = test_job(MediaType::Video, ServiceTier::Free, RAW_KEY);
        job.raw_file_url = "https://elsewhere.example.com/file.mp4".to_string();

        let err = pipeline(
            store,
            MockProber::video(hd_metadata()),
            Arc::new(MockVideoEngine::default()),
        )
        .run(&job, workdir.path(), Arc::new(RecordingSink::default()))
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::Storage(_)));
    }

    #[test]
    fn thumbnail_timestamp_is_min_of_one_second_and_midpoint() {
        assert_eq!(thumbnail_timestamp(10.0), 1.0);
        assert_eq!(thumbnail_timestamp(2.0), 1.0);
        assert_eq!(thumbnail_timestamp(1.0), 0.5);
        assert_eq!(thumbnail_timestamp(0.2), 0.1);
        assert_eq!(thumbnail_timestamp(0.0), 0.0);
    }

    #[test]
    fn content_types_cover_common_containers() {
        assert_eq!(video_content_type("mp4"), "video/mp4");
        assert_eq!(video_content_type("webm"), "video/webm");
        assert_eq!(video_content_type("xyz"), "application/octet-stream");
    }
}
