//! Chorus Database Layer
//!
//! The Job Store repository over Postgres, connection/migration helpers, and
//! the Postgres implementation of post propagation.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub mod job_store;
pub mod post_sink;

pub use job_store::JobStore;
pub use post_sink::PgPostSink;

const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Connect a pool with the worker's settings.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Apply pending migrations from this crate's migrations/ directory.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(())
}
