//! Cleaner stage: drop intermediate audio artifacts once assembly is done.
//!
//! Removes the chunk directories under every segment, then sweeps the job
//! tree for files whose extension is not on the keep list (records,
//! mappings, outputs, logs, and lock sidecars survive). Individual deletion
//! failures are logged but do not fail the job.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::{joblog, JobStore, StageHandler};
use crate::domain::Stage;

use super::{segment_dir_name, AUDIO_CHUNKS_DIR, TEXT_CHUNKS_DIR};

/// Extensions that survive cleanup. `lock` is kept so the record's lock
/// sidecar is not unlinked out from under a concurrent locker.
const KEEP_EXTENSIONS: &[&str] = &["txt", "srt", "json", "log", "lock"];

pub struct CleanerStage {
    store: JobStore,
}

impl CleanerStage {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for CleanerStage {
    fn stage(&self) -> Stage {
        Stage::Cleaner
    }

    async fn process(&self, job_id: &str) -> Result<()> {
        let job = self.store.load(job_id)?;
        let job_dir = self.store.job_dir(job_id);

        joblog::append(&job_dir, Stage::Cleaner, "starting cleanup");
        let mut removed = 0usize;

        for index in job.segment_indices() {
            let seg_dir = job_dir.join(segment_dir_name(index));
            for name in [AUDIO_CHUNKS_DIR, TEXT_CHUNKS_DIR] {
                let dir = seg_dir.join(name);
                if !dir.is_dir() {
                    continue;
                }
                match fs::remove_dir_all(&dir) {
                    Ok(()) => {
                        removed += 1;
                        joblog::append(
                            &job_dir,
                            Stage::Cleaner,
                            &format!("deleted directory {}", dir.display()),
                        );
                    }
                    Err(e) => {
                        warn!(job = %job_id, dir = %dir.display(), error = %e, "failed to delete directory");
                    }
                }
            }
        }

        removed += sweep(&job_dir, &job_dir)?;

        joblog::append(
            &job_dir,
            Stage::Cleaner,
            &format!("cleanup complete: removed {} items", removed),
        );
        info!(job = %job_id, removed, "cleanup finished");

        Ok(())
    }
}

/// Recursively delete files whose extension is not on the keep list.
fn sweep(job_dir: &Path, dir: &Path) -> Result<usize> {
    let mut removed = 0usize;

    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();

        if path.is_dir() {
            removed += sweep(job_dir, &path)?;
        } else if !keep(&path) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "failed to delete file");
                }
            }
        }
    }

    Ok(removed)
}

fn keep(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| KEEP_EXTENSIONS.iter().any(|k| ext.eq_ignore_ascii_case(k)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Job;
    use tempfile::TempDir;

    fn seed(store: &JobStore, id: &str) {
        let job_dir = store.job_dir(id);
        let seg_dir = job_dir.join("segment_0");
        fs::create_dir_all(seg_dir.join(AUDIO_CHUNKS_DIR)).unwrap();
        fs::create_dir_all(seg_dir.join(TEXT_CHUNKS_DIR)).unwrap();
        fs::create_dir_all(seg_dir.join("assembled_result")).unwrap();
        store.save(id, &Job::new(id, "talk.m4a", "en", vec![])).unwrap();

        fs::write(job_dir.join("talk.m4a"), b"original").unwrap();
        fs::write(job_dir.join("talk.wav"), b"converted").unwrap();
        fs::write(seg_dir.join(AUDIO_CHUNKS_DIR).join("chunk_1.wav"), b"c").unwrap();
        fs::write(seg_dir.join(TEXT_CHUNKS_DIR).join("chunk_1.txt"), b"t").unwrap();
        fs::write(seg_dir.join("chunks_mapping.json"), b"[]").unwrap();
        fs::write(seg_dir.join("text_mapping.json"), b"[]").unwrap();
        fs::write(
            seg_dir.join("assembled_result").join(format!("{}_0.srt", id)),
            b"1\n",
        )
        .unwrap();
        fs::write(
            seg_dir.join("assembled_result").join(format!("{}_0.txt", id)),
            b"text",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_removes_audio_keeps_outputs() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        seed(&store, "job-1");

        let handler = CleanerStage::new(store.clone());
        handler.process("job-1").await.unwrap();

        let job_dir = store.job_dir("job-1");
        let seg_dir = job_dir.join("segment_0");

        // Audio gone.
        assert!(!job_dir.join("talk.m4a").exists());
        assert!(!job_dir.join("talk.wav").exists());
        assert!(!seg_dir.join(AUDIO_CHUNKS_DIR).exists());
        assert!(!seg_dir.join(TEXT_CHUNKS_DIR).exists());

        // Record, mappings, and outputs survive.
        assert!(job_dir.join("job.json").is_file());
        assert!(seg_dir.join("chunks_mapping.json").is_file());
        assert!(seg_dir.join("text_mapping.json").is_file());
        assert!(seg_dir.join("assembled_result/job-1_0.srt").is_file());
        assert!(seg_dir.join("assembled_result/job-1_0.txt").is_file());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        seed(&store, "job-1");

        let handler = CleanerStage::new(store.clone());
        handler.process("job-1").await.unwrap();
        handler.process("job-1").await.unwrap();

        assert!(store.job_dir("job-1").join("job.json").is_file());
    }

    #[test]
    fn test_keep_list() {
        assert!(keep(Path::new("a/job.json")));
        assert!(keep(Path::new("a/out.SRT")));
        assert!(keep(Path::new("a/job.json.lock")));
        assert!(keep(Path::new("a/notes.txt")));
        assert!(keep(Path::new("a/batch.log")));
        assert!(!keep(Path::new("a/audio.wav")));
        assert!(!keep(Path::new("a/video.m4a")));
        assert!(!keep(Path::new("a/noext")));
    }
}
