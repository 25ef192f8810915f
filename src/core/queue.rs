//! Crash-safe file-backed queue of job identifiers.
//!
//! Each queue is a plain text file with one id per line plus a `.lock`
//! sidecar. Every operation runs under an exclusive advisory lock on the
//! sidecar, so only one critical section per queue executes at a time across
//! however many processes share the filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that can occur with a queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("IO error on queue {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to acquire lock for queue {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A named, durable container of string identifiers.
///
/// The three operations (`enqueue`, `pop_all`, `replace`) are each atomic
/// with respect to one another: no caller can observe a partially drained or
/// partially rewritten queue.
#[derive(Debug, Clone)]
pub struct AtomicQueue {
    path: PathBuf,
    lock_path: PathBuf,
}

impl AtomicQueue {
    /// Open a queue backed by the given file. Neither the file nor its lock
    /// sidecar needs to exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        Self {
            lock_path: PathBuf::from(lock_name),
            path,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably append one id. The write is flushed and synced before the
    /// call returns.
    pub fn enqueue(&self, id: &str) -> Result<(), QueueError> {
        let _guard = self.acquire_lock()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;

        writeln!(file, "{}", id.trim()).map_err(|e| self.io_err(e))?;
        file.flush().map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;

        Ok(())
    }

    /// Atomically return every stored id and empty the queue.
    ///
    /// The read and the truncation happen in the same critical section. If
    /// the read fails the queue is left untouched, so a transient I/O error
    /// never drops claimed work.
    pub fn pop_all(&self) -> Result<Vec<String>, QueueError> {
        let _guard = self.acquire_lock()?;

        let ids = match fs::read_to_string(&self.path) {
            Ok(content) => parse_lines(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(self.io_err(e)),
        };

        if !ids.is_empty() {
            // Truncate only after a successful read.
            File::create(&self.path).map_err(|e| self.io_err(e))?;
        }

        Ok(ids)
    }

    /// Atomically overwrite the contents with exactly `ids`, dropping
    /// whatever was stored before. Written via a temp file and rename so a
    /// crash mid-write cannot leave a half-written queue.
    pub fn replace(&self, ids: &[String]) -> Result<(), QueueError> {
        let _guard = self.acquire_lock()?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| self.io_err(e))?;
        for id in ids {
            writeln!(tmp, "{}", id.trim()).map_err(|e| self.io_err(e))?;
        }
        tmp.flush().map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;

        Ok(())
    }

    fn acquire_lock(&self) -> Result<File, QueueError> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| QueueError::Lock {
                path: self.path.clone(),
                source: e,
            })?;

        lock_file.lock_exclusive().map_err(|e| QueueError::Lock {
            path: self.path.clone(),
            source: e,
        })?;

        // Released when the returned handle is dropped.
        Ok(lock_file)
    }

    fn io_err(&self, source: std::io::Error) -> QueueError {
        QueueError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
