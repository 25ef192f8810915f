//! Lock-protected storage for per-job metadata records.
//!
//! Each job directory holds a `job.json` record plus a `job.json.lock`
//! sidecar. Loads and saves take the same per-job exclusive lock, and
//! `stamp` performs its read-modify-write inside a single critical section
//! so concurrent stampers cannot lose an update.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Job, Stage};

pub const RECORD_FILE: &str = "job.json";

/// Errors that can occur with the record store
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("job record not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error on job record {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt job record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Handle to the job records under one data directory.
#[derive(Debug, Clone)]
pub struct JobStore {
    data_dir: PathBuf,
}

impl JobStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// The directory holding everything belonging to one job.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.data_dir.join(job_id)
    }

    /// Path of a job's record file.
    pub fn record_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(RECORD_FILE)
    }

    /// Load a job's record.
    pub fn load(&self, job_id: &str) -> Result<Job, RecordError> {
        let path = self.record_path(job_id);
        let _guard = self.acquire_lock(&path)?;
        read_record(&path)
    }

    /// Fully overwrite a job's record. Callers must always load before
    /// mutating; there are no merge semantics.
    pub fn save(&self, job_id: &str, job: &Job) -> Result<(), RecordError> {
        let path = self.record_path(job_id);
        let _guard = self.acquire_lock(&path)?;
        write_record(&path, job)
    }

    /// Set the completion timestamp for one stage to now.
    pub fn stamp(&self, job_id: &str, stage: Stage) -> Result<DateTime<Utc>, RecordError> {
        self.stamp_at(job_id, stage, Utc::now())
    }

    /// Set the completion timestamp for one stage. Read-modify-write under
    /// the job's lock.
    pub fn stamp_at(
        &self,
        job_id: &str,
        stage: Stage,
        timestamp: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, RecordError> {
        let path = self.record_path(job_id);
        let _guard = self.acquire_lock(&path)?;

        let mut job = read_record(&path)?;
        if job.stage_completed_at(stage).is_some() {
            // Re-stamp on idempotent re-processing; expected under
            // at-least-once delivery.
            debug!(job = %job_id, %stage, "stage already stamped, overwriting");
        }
        job.stage_timestamps.insert(stage, Some(timestamp));
        write_record(&path, &job)?;

        Ok(timestamp)
    }

    fn acquire_lock(&self, record_path: &Path) -> Result<File, RecordError> {
        let mut lock_name = record_path.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| io_err(record_path, e))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| io_err(record_path, e))?;

        Ok(lock_file)
    }
}

fn read_record(path: &Path) -> Result<Job, RecordError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RecordError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(io_err(path, e)),
    };

    serde_json::from_str(&content).map_err(|e| RecordError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_record(path: &Path, job: &Job) -> Result<(), RecordError> {
    let dir = path.parent().ok_or_else(|| {
        io_err(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "record path has no parent"),
        )
    })?;

    let json = serde_json::to_string_pretty(job).map_err(|e| RecordError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_err(path, e))?;
    tmp.write_all(json.as_bytes()).map_err(|e| io_err(path, e))?;
    tmp.write_all(b"\n").map_err(|e| io_err(path, e))?;
    tmp.flush().map_err(|e| io_err(path, e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(path, e))?;
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;

    Ok(())
}

fn io_err(path: &Path, source: std::io::Error) -> RecordError {
    RecordError::Io {
        path: path.to_path_buf(),
        source,
    }
}
