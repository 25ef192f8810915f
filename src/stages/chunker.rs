//! Chunker stage: cut each requested segment into bounded chunks at
//! detected silence and export them for transcription.

use std::fs;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::audio;
use crate::core::{joblog, JobStore, StageHandler};
use crate::domain::{ChunkEntry, Job, Stage};
use crate::engine::{split_by_silence, SegmentationConfig};

use super::{canonical_wav_name, segment_dir_name, write_json, AUDIO_CHUNKS_DIR, CHUNKS_MAPPING_FILE};

pub struct ChunkerStage {
    store: JobStore,
    config: SegmentationConfig,
}

impl ChunkerStage {
    pub fn new(store: JobStore, config: SegmentationConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl StageHandler for ChunkerStage {
    fn stage(&self) -> Stage {
        Stage::Chunker
    }

    async fn process(&self, job_id: &str) -> Result<()> {
        let job = self.store.load(job_id)?;
        let job_dir = self.store.job_dir(job_id);

        let wav_path = job_dir.join(canonical_wav_name(&job.source_filename));
        let sound = audio::read_wav(&wav_path)?;
        let total_ms = sound.duration_ms();

        joblog::append(
            &job_dir,
            Stage::Chunker,
            &format!("splitting audio of {} ms", total_ms),
        );

        for index in job.segment_indices() {
            let (start_ms, end_ms) = segment_bounds(&job, index, total_ms)?;
            let piece = sound.slice_ms(start_ms, end_ms);
            let spans = split_by_silence(&piece, &self.config);

            let seg_name = segment_dir_name(index);
            let audio_dir = job_dir.join(&seg_name).join(AUDIO_CHUNKS_DIR);
            fs::create_dir_all(&audio_dir)
                .with_context(|| format!("failed to create {}", audio_dir.display()))?;

            let mut entries = Vec::with_capacity(spans.len());
            for (i, span) in spans.iter().enumerate() {
                let number = i as u32 + 1;
                let file_name = format!("chunk_{}.wav", number);
                let chunk = piece.slice_ms(span.start_ms, span.end_ms);
                audio::write_wav(&audio_dir.join(&file_name), &chunk)?;

                entries.push(ChunkEntry {
                    index: number,
                    chunk_file: format!("{}/{}/{}", seg_name, AUDIO_CHUNKS_DIR, file_name),
                    start_ms: span.start_ms,
                    end_ms: span.end_ms,
                });
            }

            write_json(&job_dir.join(&seg_name).join(CHUNKS_MAPPING_FILE), &entries)?;

            joblog::append(
                &job_dir,
                Stage::Chunker,
                &format!(
                    "segment {}: {} chunks over [{}ms, {}ms)",
                    index,
                    entries.len(),
                    start_ms,
                    end_ms
                ),
            );
            info!(job = %job_id, segment = index, chunks = entries.len(), "segment chunked");
        }

        Ok(())
    }
}

/// Millisecond bounds of one segment within the canonical audio, clamped to
/// the file's duration.
fn segment_bounds(job: &Job, index: u32, total_ms: u64) -> Result<(u64, u64)> {
    match job.segment_request(index) {
        Some(request) => {
            let start = request.start_ms()?.min(total_ms);
            let end = request
                .end_ms()?
                .unwrap_or(total_ms)
                .clamp(start, total_ms);
            Ok((start, end))
        }
        None => Ok((0, total_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PcmAudio;
    use crate::domain::SegmentRequest;
    use tempfile::TempDir;

    const RATE: u32 = 8000;

    fn tone(duration_ms: u64, gaps: &[(u64, u64)]) -> PcmAudio {
        let per_ms = RATE as u64 / 1000;
        let mut samples = vec![8000i16; (duration_ms * per_ms) as usize];
        for &(from, to) in gaps {
            for s in &mut samples[(from * per_ms) as usize..(to * per_ms) as usize] {
                *s = 0;
            }
        }
        PcmAudio::new(samples, RATE)
    }

    fn seed(store: &JobStore, id: &str, segments: Vec<SegmentRequest>, sound: &PcmAudio) {
        fs::create_dir_all(store.job_dir(id)).unwrap();
        store
            .save(id, &Job::new(id, "talk.wav", "en", segments))
            .unwrap();
        audio::write_wav(&store.job_dir(id).join("talk.wav"), sound).unwrap();
    }

    #[tokio::test]
    async fn test_whole_file_job_uses_segment_zero() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        seed(&store, "job-1", vec![], &tone(12_000, &[(5_000, 6_000)]));

        let handler = ChunkerStage::new(store.clone(), SegmentationConfig::default());
        handler.process("job-1").await.unwrap();

        let entries: Vec<ChunkEntry> = super::super::read_json(
            &store
                .job_dir("job-1")
                .join("segment_0")
                .join(CHUNKS_MAPPING_FILE),
        )
        .unwrap();

        // Cut at the end of the gap, then the remainder.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start_ms, 0);
        assert_eq!(entries[0].end_ms, 6_000);
        assert_eq!(entries[1].end_ms, 12_000);
        assert_eq!(entries[0].chunk_file, "segment_0/audio_chunks/chunk_1.wav");

        for entry in &entries {
            let path = store.job_dir("job-1").join(&entry.chunk_file);
            let chunk = audio::read_wav(&path).unwrap();
            assert_eq!(chunk.duration_ms(), entry.end_ms - entry.start_ms);
        }
    }

    #[tokio::test]
    async fn test_user_segment_offsets_are_relative() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        // Gap at absolute 21-22 s = 11-12 s into the requested segment.
        seed(
            &store,
            "job-1",
            vec![SegmentRequest::new("00:00:10", "00:00:40")],
            &tone(40_000, &[(21_000, 22_000)]),
        );

        let config = SegmentationConfig {
            max_segment_ms: 20_000,
            ..SegmentationConfig::default()
        };
        let handler = ChunkerStage::new(store.clone(), config);
        handler.process("job-1").await.unwrap();

        let entries: Vec<ChunkEntry> = super::super::read_json(
            &store
                .job_dir("job-1")
                .join("segment_1")
                .join(CHUNKS_MAPPING_FILE),
        )
        .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].start_ms, entries[0].end_ms), (0, 12_000));
        assert_eq!((entries[1].start_ms, entries[1].end_ms), (12_000, 30_000));
    }

    #[tokio::test]
    async fn test_end_clamped_to_duration() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        seed(
            &store,
            "job-1",
            vec![SegmentRequest::new("00:00:05", "01:00:00")],
            &tone(8_000, &[]),
        );

        let handler = ChunkerStage::new(store.clone(), SegmentationConfig::default());
        handler.process("job-1").await.unwrap();

        let entries: Vec<ChunkEntry> = super::super::read_json(
            &store
                .job_dir("job-1")
                .join("segment_1")
                .join(CHUNKS_MAPPING_FILE),
        )
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!((entries[0].start_ms, entries[0].end_ms), (0, 3_000));
    }

    #[tokio::test]
    async fn test_missing_wav_fails_job() {
        let temp = TempDir::new().unwrap();
        let store = JobStore::new(temp.path());
        fs::create_dir_all(store.job_dir("job-1")).unwrap();
        store
            .save("job-1", &Job::new("job-1", "talk.wav", "en", vec![]))
            .unwrap();

        let handler = ChunkerStage::new(store, SegmentationConfig::default());
        assert!(handler.process("job-1").await.is_err());
    }

    #[test]
    fn test_segment_bounds_invalid_timecode_errors() {
        let job = Job::new(
            "j",
            "a.wav",
            "en",
            vec![SegmentRequest::new("nonsense", "")],
        );
        assert!(segment_bounds(&job, 1, 10_000).is_err());
    }
}
