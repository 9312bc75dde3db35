use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chorus_core::WorkerConfig;
use chorus_db::{JobStore, PgPostSink};
use chorus_processing::{
    AudioPipeline, FfmpegAudioEngine, FfmpegVideoEngine, FfprobeProber, VideoPipeline,
};
use chorus_worker::Worker;

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "chorus=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env()?;
    init_tracing();

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::info!(
        host = %host,
        storage_backend = ?config.storage_backend,
        "Chorus media worker starting"
    );

    let pool = chorus_db::connect(&config.database_url, config.db_max_connections).await?;
    chorus_db::run_migrations(&pool).await?;

    let store = chorus_storage::create_store(&config).await?;
    let prober = Arc::new(FfprobeProber::new(config.ffprobe_path.clone()));

    let video = VideoPipeline::new(
        store.clone(),
        prober.clone(),
        Arc::new(FfmpegVideoEngine::new(config.ffmpeg_path.clone())),
    );
    let audio = AudioPipeline::new(
        store,
        prober,
        Arc::new(FfmpegAudioEngine::new(config.ffmpeg_path.clone())),
    );

    let worker = Worker::new(
        JobStore::new(pool.clone()),
        Arc::new(PgPostSink::new(pool)),
        video,
        audio,
        &config,
    );

    worker.run().await;

    Ok(())
}
