//! Worker configuration.
//!
//! Loaded from the environment once at boot, following the platform's
//! convention of a plain struct with defaulted fields rather than a config
//! file. `.env` is honored in development via dotenvy.

use std::env;

use crate::storage_types::StorageBackend;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_STALE_AFTER_SECS: i64 = 600;
const DEFAULT_PROGRESS_WRITE_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Media engine configuration
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    // Loop tuning
    pub poll_interval_ms: u64,
    /// Jobs stuck in `processing` longer than this are swept back to pending.
    pub stale_after_secs: i64,
    /// Minimum interval between persisted progress writes for one job.
    pub progress_write_interval_ms: u64,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse::<StorageBackend>()?;

        Ok(Self {
            database_url,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok().or_else(|| env::var("AWS_REGION").ok()),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            poll_interval_ms: parse_env("WORKER_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            stale_after_secs: parse_env("JOB_STALE_AFTER_SECS", DEFAULT_STALE_AFTER_SECS),
            progress_write_interval_ms: parse_env(
                "PROGRESS_WRITE_INTERVAL_MS",
                DEFAULT_PROGRESS_WRITE_INTERVAL_MS,
            ),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_on_missing_or_invalid() {
        env::remove_var("CHORUS_TEST_MISSING");
        assert_eq!(parse_env("CHORUS_TEST_MISSING", 7u32), 7);

        env::set_var("CHORUS_TEST_INVALID", "not-a-number");
        assert_eq!(parse_env("CHORUS_TEST_INVALID", 7u32), 7);
        env::remove_var("CHORUS_TEST_INVALID");

        env::set_var("CHORUS_TEST_VALID", "42");
        assert_eq!(parse_env("CHORUS_TEST_VALID", 7u32), 42);
        env::remove_var("CHORUS_TEST_VALID");
    }
}
