//! Bounded-rate progress publisher.
//!
//! The engines emit completion fractions far faster than the Job Store
//! should be written. This sink enforces monotonicity and a minimum interval
//! between persisted writes, and swallows its own failures: progress is
//! telemetry, never a correctness signal.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use chorus_db::JobStore;
use chorus_processing::ProgressSink;

struct PublishState {
    last_write: Option<Instant>,
    last_percent: i32,
}

pub struct JobProgressPublisher {
    store: JobStore,
    job_id: Uuid,
    attempt: i32,
    min_interval: Duration,
    state: Mutex<PublishState>,
}

impl JobProgressPublisher {
    pub fn new(store: JobStore, job_id: Uuid, attempt: i32, min_interval: Duration) -> Self {
        Self {
            store,
            job_id,
            attempt,
            min_interval,
            state: Mutex::new(PublishState {
                last_write: None,
                last_percent: 0,
            }),
        }
    }
}

/// Decide whether a report is worth a database write, updating `state` when
/// it is. Regressions and writes inside the rate window are dropped.
fn should_publish(
    state: &mut PublishState,
    percent: i32,
    min_interval: Duration,
    now: Instant,
) -> bool {
    if percent <= state.last_percent {
        return false;
    }
    if let Some(last) = state.last_write {
        if now.duration_since(last) < min_interval {
            return false;
        }
    }
    state.last_percent = percent;
    state.last_write = Some(now);
    true
}

#[async_trait]
impl ProgressSink for JobProgressPublisher {
    async fn report(&self, percent: i32) {
        let publish = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            should_publish(&mut state, percent, self.min_interval, Instant::now())
        };
        if !publish {
            return;
        }

        match self
            .store
            .update_progress(self.job_id, self.attempt, percent)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    attempt = self.attempt,
                    "Progress write superseded by a newer attempt"
                );
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Failed to persist progress");
            }
        }
    }
}
