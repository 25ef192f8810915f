//! Transcriber stage: send each chunk to the speech-to-text backend and
//! record the chunk→text mapping.
//!
//! A chunk that fails transcription is logged and skipped; it simply gets
//! no mapping entry, and assembly leaves that span out of the transcript.
//! Only whole-segment problems (missing mapping, unreadable chunk file)
//! fail the job.

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::{joblog, JobStore, StageHandler};
use crate::domain::{ChunkEntry, Stage, TextEntry};
use crate::inference::TranscriptionBackend;

use super::{read_json, segment_dir_name, write_json, CHUNKS_MAPPING_FILE, TEXT_CHUNKS_DIR, TEXT_MAPPING_FILE};

pub struct TranscriberStage {
    store: JobStore,
    backend: Arc<dyn TranscriptionBackend>,
}

impl TranscriberStage {
    pub fn new(store: JobStore, backend: Arc<dyn TranscriptionBackend>) -> Self {
        Self { store, backend }
    }
}

#[async_trait]
impl StageHandler for TranscriberStage {
    fn stage(&self) -> Stage {
        Stage::Transcriber
    }

    async fn process(&self, job_id: &str) -> Result<()> {
        let job = self.store.load(job_id)?;
        let job_dir = self.store.job_dir(job_id);

        for index in job.segment_indices() {
            let seg_name = segment_dir_name(index);
            let seg_dir = job_dir.join(&seg_name);

            let chunks: Vec<ChunkEntry> = read_json(&seg_dir.join(CHUNKS_MAPPING_FILE))?;
            let text_dir = seg_dir.join(TEXT_CHUNKS_DIR);
            fs::create_dir_all(&text_dir)
                .with_context(|| format!("failed to create {}", text_dir.display()))?;

            let mut mapping: Vec<TextEntry> = Vec::with_capacity(chunks.len());

            for entry in &chunks {
                let chunk_path = job_dir.join(&entry.chunk_file);
                let bytes = fs::read(&chunk_path)
                    .with_context(|| format!("failed to read {}", chunk_path.display()))?;

                let chunk_name = format!("chunk_{}.wav", entry.index);
                let text = match self
                    .backend
                    .transcribe(bytes, &chunk_name, &job.language_key)
                    .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(
                            job = %job_id,
                            segment = index,
                            chunk = entry.index,
                            error = %e,
                            "chunk transcription failed, skipping"
                        );
                        joblog::append(
                            &job_dir,
                            Stage::Transcriber,
                            &format!(
                                "segment {} chunk {} failed transcription, skipping",
                                index, entry.index
                            ),
                        );
                        continue;
                    }
                };

                let text_name = format!("chunk_{}.txt", entry.index);
                fs::write(text_dir.join(&text_name), &text)
                    .with_context(|| format!("failed to write transcription for {}", chunk_name))?;

                mapping.push(TextEntry {
                    index: entry.index,
                    audio_file: entry.chunk_file.clone(),
                    text_file: format!("{}/{}/{}", seg_name, TEXT_CHUNKS_DIR, text_name),
                });

                joblog::append(
                    &job_dir,
                    Stage::Transcriber,
                    &format!(
                        "segment {} chunk {} transcribed ({} chars)",
                        index,
                        entry.index,
                        text.len()
                    ),
                );
            }

            write_json(&seg_dir.join(TEXT_MAPPING_FILE), &mapping)?;
            info!(
                job = %job_id,
                segment = index,
                transcribed = mapping.len(),
                total = chunks.len(),
                "segment transcribed"
            );
        }

        Ok(())
    }
}
