//! Progress plumbing: ffmpeg `-progress` parsing, stage-range mapping, and
//! the sink trait pipelines report through.
//!
//! Progress is best-effort telemetry for external pollers, never a
//! correctness signal; the sink implementation decides how often writes
//! actually reach the Job Store.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

static OUT_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"out_time_ms=(\d+)").expect("invalid out_time regex"));

/// Parse one line of ffmpeg `-progress pipe:1` output into a completion
/// fraction, given the known source duration. `out_time_ms` is in
/// microseconds despite the name.
pub fn parse_progress_line(line: &str, duration_secs: f64) -> Option<f64> {
    if duration_secs <= 0.0 {
        return None;
    }
    let caps = OUT_TIME_RE.captures(line)?;
    let elapsed_us: u64 = caps[1].parse().ok()?;
    Some((elapsed_us as f64 / 1_000_000.0 / duration_secs).min(1.0))
}

/// Map an engine completion fraction into a stage's percent range.
pub fn map_stage_progress(fraction: f64, lo: i32, hi: i32) -> i32 {
    let fraction = fraction.clamp(0.0, 1.0);
    lo + ((hi - lo) as f64 * fraction).round() as i32
}

/// Receives persisted progress percentages from a pipeline.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Report a 0-100 percentage. Implementations swallow their own errors;
    /// a lost progress write never fails the job.
    async fn report(&self, percent: i32);
}

/// Sink that discards every report.
pub struct NullProgressSink;

#[async_trait]
impl ProgressSink for NullProgressSink {
    async fn report(&self, _percent: i32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_time_parsed_as_fraction_of_duration() {
        assert_eq!(parse_progress_line("out_time_ms=5000000", 10.0), Some(0.5));
        assert_eq!(parse_progress_line("out_time_ms=10000000", 10.0), Some(1.0));
    }

    #[test]
    fn fraction_clamped_past_duration() {
        assert_eq!(parse_progress_line("out_time_ms=15000000", 10.0), Some(1.0));
    }

    #[test]
    fn non_progress_lines_ignored() {
        assert_eq!(parse_progress_line("frame=100", 10.0), None);
        assert_eq!(parse_progress_line("speed=2.5x", 10.0), None);
    }

    #[test]
    fn zero_duration_yields_nothing() {
        assert_eq!(parse_progress_line("out_time_ms=1000000", 0.0), None);
    }

    #[test]
    fn stage_mapping_covers_range_endpoints() {
        assert_eq!(map_stage_progress(0.0, 20, 80), 20);
        assert_eq!(map_stage_progress(0.5, 20, 80), 50);
        assert_eq!(map_stage_progress(1.0, 20, 80), 80);
    }

    #[test]
    fn stage_mapping_clamps_out_of_range_fractions() {
        assert_eq!(map_stage_progress(-0.5, 25, 65), 25);
        assert_eq!(map_stage_progress(1.5, 25, 65), 65);
    }

    #[test]
    fn stage_mapping_is_monotonic() {
        let mut last = 0;
        for step in 0..=100 {
            let mapped = map_stage_progress(step as f64 / 100.0, 20, 80);
            assert!(mapped >= last);
            last = mapped;
        }
    }
}
