//! Inbound job creation.
//!
//! The only externally triggered entry point into the pipeline: create the
//! job directory, copy the source audio in, write the initial record, then
//! enqueue the id on the converter queue. The record is always written
//! before the enqueue so the converter never sees a job without one.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::info;

use crate::config::PipelineConfig;
use crate::core::{joblog, AtomicQueue, JobStore};
use crate::domain::{Job, SegmentRequest, Stage};

/// Everything needed to create one job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Audio file to ingest; copied into the job directory.
    pub source_path: PathBuf,

    /// Language key forwarded to the inference backend.
    pub language_key: String,

    /// Requested time ranges; empty processes the whole file.
    pub segments: Vec<SegmentRequest>,
}

/// Create a job and hand it to the converter stage. Returns the job id,
/// which is also the name of the job's directory.
pub fn submit_job(config: &PipelineConfig, request: &JobRequest) -> Result<String> {
    if !request.source_path.is_file() {
        bail!(
            "source audio not found: {}",
            request.source_path.display()
        );
    }

    let file_name = request
        .source_path
        .file_name()
        .map(|n| sanitize(&n.to_string_lossy()))
        .filter(|n| !n.is_empty())
        .context("source path has no usable file name")?;

    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&file_name)
        .to_string();

    let job_id = format!(
        "{}_{}_{}",
        Utc::now().format("%Y_%m_%d__%H_%M_%S"),
        sanitize(&request.language_key),
        stem
    );

    let job_dir = config.data_dir.join(&job_id);
    if job_dir.exists() {
        bail!("job directory already exists: {}", job_dir.display());
    }
    fs::create_dir_all(&job_dir)
        .with_context(|| format!("failed to create job directory {}", job_dir.display()))?;

    fs::copy(&request.source_path, job_dir.join(&file_name)).with_context(|| {
        format!(
            "failed to copy source audio into {}",
            job_dir.display()
        )
    })?;

    let job = Job::new(
        job_id.clone(),
        file_name,
        request.language_key.clone(),
        request.segments.clone(),
    );

    let store = JobStore::new(&config.data_dir);
    store.save(&job_id, &job)?;

    let converter_queue = AtomicQueue::open(Stage::Converter.queue_path(&config.data_dir));
    converter_queue.enqueue(&job_id)?;

    joblog::append(&job_dir, Stage::Converter, "job submitted");
    info!(job = %job_id, "job submitted to converter queue");

    Ok(job_id)
}

/// Keep file and language names shell- and path-safe: alphanumerics, dash,
/// underscore, and dot survive; everything else becomes an underscore.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}
