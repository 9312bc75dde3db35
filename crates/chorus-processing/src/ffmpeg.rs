//! Shared ffmpeg process execution.
//!
//! Both engine adapters funnel through these helpers: one for long-running
//! invocations that stream `-progress pipe:1` lines, one for short
//! invocations where only the exit status and captured output matter.

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use chorus_core::PipelineError;

use crate::progress::parse_progress_line;

const STDERR_SNIPPET_LEN: usize = 2048;

/// Run an ffmpeg invocation whose stdout carries `-progress pipe:1` output,
/// forwarding completion fractions to `progress` as they arrive. Blocks
/// until the process exits; a non-zero status surfaces the engine's stderr.
pub(crate) async fn run_with_progress(
    mut cmd: Command,
    duration_secs: f64,
    progress: mpsc::UnboundedSender<f64>,
) -> Result<(), PipelineError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| PipelineError::Engine(format!("failed to spawn ffmpeg: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| PipelineError::Engine("ffmpeg stdout unavailable".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| PipelineError::Engine("ffmpeg stderr unavailable".to_string()))?;

    let progress_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(fraction) = parse_progress_line(&line, duration_secs) {
                // Receiver gone means the pipeline stopped listening; keep
                // draining so the child never blocks on a full pipe.
                let _ = progress.send(fraction);
            }
        }
    });

    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let status = child
        .wait()
        .await
        .map_err(|e| PipelineError::Engine(format!("failed to wait for ffmpeg: {}", e)))?;

    let _ = progress_task.await;
    let stderr_text = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(PipelineError::Engine(stderr_snippet(&stderr_text)));
    }

    Ok(())
}

/// Run a short ffmpeg invocation to completion, returning captured stdout.
pub(crate) async fn run_capturing(mut cmd: Command) -> Result<Vec<u8>, PipelineError> {
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| PipelineError::Engine(format!("failed to execute ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Engine(stderr_snippet(&stderr)));
    }

    Ok(output.stdout)
}

/// ffmpeg stderr can run to megabytes on long inputs; keep the tail, which
/// carries the actual error line.
fn stderr_snippet(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return "ffmpeg exited with a non-zero status".to_string();
    }
    if trimmed.len() <= STDERR_SNIPPET_LEN {
        return trimmed.to_string();
    }
    let tail_start = trimmed.len() - STDERR_SNIPPET_LEN;
    // Avoid splitting a UTF-8 character.
    let tail_start = (tail_start..trimmed.len())
        .find(|&i| trimmed.is_char_boundary(i))
        .unwrap_or(tail_start);
    format!("... {}", &trimmed[tail_start..])
}
