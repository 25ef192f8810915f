//! Assembler stage: rebuild the absolute timeline and write the transcript
//! and subtitle files for each segment.

use std::collections::HashMap;
use std::fs;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::{joblog, JobStore, StageHandler};
use crate::domain::{ChunkEntry, Stage, TextEntry};
use crate::engine::{assemble, ResolvedChunk};

use super::{read_json, segment_dir_name, ASSEMBLED_DIR, CHUNKS_MAPPING_FILE, TEXT_MAPPING_FILE};

pub struct AssemblerStage {
    store: JobStore,
}

impl AssemblerStage {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for AssemblerStage {
    fn stage(&self) -> Stage {
        Stage::Assembler
    }

    async fn process(&self, job_id: &str) -> Result<()> {
        let job = self.store.load(job_id)?;
        let job_dir = self.store.job_dir(job_id);

        for index in job.segment_indices() {
            let seg_dir = job_dir.join(segment_dir_name(index));

            let chunks: Vec<ChunkEntry> = read_json(&seg_dir.join(CHUNKS_MAPPING_FILE))?;
            let texts: Vec<TextEntry> = read_json(&seg_dir.join(TEXT_MAPPING_FILE))?;
            let lookup: HashMap<&str, &str> = texts
                .iter()
                .map(|t| (t.audio_file.as_str(), t.text_file.as_str()))
                .collect();

            // The segment's start within the original file; the implicit
            // whole-file segment sits at zero.
            let base_ms = match job.segment_request(index) {
                Some(request) => request.start_ms()?,
                None => 0,
            };

            let mut resolved = Vec::with_capacity(chunks.len());
            for entry in &chunks {
                let text = match lookup.get(entry.chunk_file.as_str()) {
                    Some(text_rel) => {
                        let text_path = job_dir.join(text_rel);
                        let raw = fs::read_to_string(&text_path).with_context(|| {
                            format!("failed to read {}", text_path.display())
                        })?;
                        Some(raw.trim().to_string())
                    }
                    None => {
                        warn!(
                            job = %job_id,
                            segment = index,
                            chunk = %entry.chunk_file,
                            "no text mapping for chunk, skipping"
                        );
                        joblog::append(
                            &job_dir,
                            Stage::Assembler,
                            &format!("segment {} chunk {} has no text, skipping", index, entry.index),
                        );
                        None
                    }
                };
                resolved.push(ResolvedChunk {
                    start_ms: entry.start_ms,
                    end_ms: entry.end_ms,
                    text,
                });
            }

            let output = assemble(base_ms, resolved);

            let out_dir = seg_dir.join(ASSEMBLED_DIR);
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;

            // Deterministic names: re-runs overwrite rather than duplicate.
            let txt_path = out_dir.join(format!("{}_{}.txt", job_id, index));
            let srt_path = out_dir.join(format!("{}_{}.srt", job_id, index));
            fs::write(&txt_path, &output.transcript)
                .with_context(|| format!("failed to write {}", txt_path.display()))?;
            fs::write(&srt_path, &output.subtitles)
                .with_context(|| format!("failed to write {}", srt_path.display()))?;

            joblog::append(
                &job_dir,
                Stage::Assembler,
                &format!(
                    "segment {}: {} subtitle entries written, {} chunks skipped",
                    index, output.retained, output.skipped
                ),
            );
            info!(
                job = %job_id,
                segment = index,
                retained = output.retained,
                skipped = output.skipped,
                "segment assembled"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Job, SegmentRequest};
    use crate::stages::write_json;
    use tempfile::TempDir;

    fn seed_segment(
        store: &JobStore,
        id: &str,
        segments: Vec<SegmentRequest>,
        index: u32,
        chunks: &[(u64, u64)],
        texts: &[(u32, &str)],
    ) {
        let job_dir = store.job_dir(id);
        let seg_dir = job_dir.join(segment_dir_name(index));
        fs::create_dir_all(seg_dir.join("text_chunks")).unwrap();
        store
            .save(id, &Job::new(id, "talk.wav", "en", segments))
            .unwrap();

        let chunk_entries: Vec<ChunkEntry> = chunks
            .iter()
            .enumerate()
            .map(|(i, &(start_ms, end_ms))| ChunkEntry {
                index: i as u32 + 1,
                chunk_file: format!(
                    "{}/audio_chunks/chunk_{}.wav",
                    segment_dir_name(index),
                    i + 1
                ),
                start_ms,
                end_ms,
            })
            .collect();
        write_json(&seg_dir.join(CHUNKS_MAPPING_FILE), &chunk_entries).unwrap();

        let text_entries: Vec<TextEntry> = texts
            .iter()
            .map(|&(n, text)| {
                let rel = format!("{}/text_chunks/chunk_{}.txt", segment_dir_name(index), n);
                fs::write(job_dir.join(&rel), format!("{}\n", text)).unwrap();
                TextEntry {
                    index: n,
                    audio_file: format!(
                        "{}/audio_chunks/chunk_{}.wav",
                        segment_dir_name(index),
                        n
                    ),
                    text_file: rel,
                }
            })
            .collect();
        write_json(&seg_dir.join(TEXT_MAPPING_FILE), &text_entries).unwrap();
    }

    fn prepare(store: &JobStore, id: &str) {
        fs::create_dir_all(store.job_dir(id)).unwrap();
    }

    #[tokio::test]
    async fn test_absolute_timestamps_from_segment_base() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        prepare(&store, "job-1");
        seed_segment(
            &store,
            "job-1",
            vec![SegmentRequest::new("00:01:00", "")],
            1,
            &[(0, 5_000)],
            &[(1, "hello there")],
        );

        let handler = AssemblerStage::new(store.clone());
        handler.process("job-1").await.unwrap();

        let srt = fs::read_to_string(
            store
                .job_dir("job-1")
                .join("segment_1/assembled_result/job-1_1.srt"),
        )
        .unwrap();
        assert_eq!(srt, "1\n00:01:00,000 --> 00:01:05,000\nhello there\n\n");

        let txt = fs::read_to_string(
            store
                .job_dir("job-1")
                .join("segment_1/assembled_result/job-1_1.txt"),
        )
        .unwrap();
        assert_eq!(txt, "hello there");
    }

    #[tokio::test]
    async fn test_unmapped_chunk_skipped_and_renumbered() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        prepare(&store, "job-1");
        seed_segment(
            &store,
            "job-1",
            vec![],
            0,
            &[(0, 1_000), (1_000, 2_000), (2_000, 3_000)],
            &[(1, "first"), (3, "third")],
        );

        let handler = AssemblerStage::new(store.clone());
        handler.process("job-1").await.unwrap();

        let srt = fs::read_to_string(
            store
                .job_dir("job-1")
                .join("segment_0/assembled_result/job-1_0.srt"),
        )
        .unwrap();
        assert!(srt.contains("2\n00:00:02,000 --> 00:00:03,000\nthird"));
        assert!(!srt.contains("\n3\n"));

        let txt = fs::read_to_string(
            store
                .job_dir("job-1")
                .join("segment_0/assembled_result/job-1_0.txt"),
        )
        .unwrap();
        assert_eq!(txt, "first\nthird");
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        prepare(&store, "job-1");
        seed_segment(
            &store,
            "job-1",
            vec![],
            0,
            &[(0, 2_000), (2_000, 4_000)],
            &[(1, "alpha"), (2, "beta")],
        );

        let handler = AssemblerStage::new(store.clone());
        handler.process("job-1").await.unwrap();

        let srt_path = store
            .job_dir("job-1")
            .join("segment_0/assembled_result/job-1_0.srt");
        let txt_path = store
            .job_dir("job-1")
            .join("segment_0/assembled_result/job-1_0.txt");
        let first_srt = fs::read(&srt_path).unwrap();
        let first_txt = fs::read(&txt_path).unwrap();

        handler.process("job-1").await.unwrap();
        assert_eq!(fs::read(&srt_path).unwrap(), first_srt);
        assert_eq!(fs::read(&txt_path).unwrap(), first_txt);
    }

    #[tokio::test]
    async fn test_unreadable_mapped_text_fails_job() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        prepare(&store, "job-1");
        seed_segment(&store, "job-1", vec![], 0, &[(0, 1_000)], &[(1, "text")]);

        // Break the mapped text file after seeding.
        fs::remove_file(
            store
                .job_dir("job-1")
                .join("segment_0/text_chunks/chunk_1.txt"),
        )
        .unwrap();

        let handler = AssemblerStage::new(store);
        assert!(handler.process("job-1").await.is_err());
    }
}
