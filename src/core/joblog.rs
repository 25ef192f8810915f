//! Per-job human-readable progress log.
//!
//! Each stage appends timestamped lines to `<job_id>.log` inside the job
//! directory. The log is an observability sink only: writes are best-effort
//! and never fail the job.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use tracing::debug;

use crate::domain::Stage;

/// Append one progress line for a stage to the job's log file.
pub fn append(job_dir: &Path, stage: Stage, message: &str) {
    let name = job_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string());
    let path = job_dir.join(format!("{}.log", name));

    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| {
            writeln!(
                file,
                "{} [{}] {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S"),
                stage,
                message
            )
        });

    if let Err(e) = result {
        debug!(path = %path.display(), error = %e, "failed to append job log line");
    }
}
