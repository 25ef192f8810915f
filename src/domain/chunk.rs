//! Chunk entities produced by segmentation and consumed by assembly.

use serde::{Deserialize, Serialize};

/// A half-open time range `[start_ms, end_ms)` relative to its segment's
/// start, produced by the segmentation engine. Spans within a segment are
/// contiguous: each span starts where the previous one ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChunkSpan {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// One exported audio chunk, persisted in a segment's `chunks_mapping.json`.
/// `chunk_file` is relative to the job directory. The `index` field carries
/// ordering explicitly instead of encoding it only in the file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkEntry {
    pub index: u32,
    pub chunk_file: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Pairing of a transcribed chunk's audio path with its text path, persisted
/// in a segment's `text_mapping.json`. Chunks whose transcription failed have
/// no entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextEntry {
    pub index: u32,
    pub audio_file: String,
    pub text_file: String,
}
