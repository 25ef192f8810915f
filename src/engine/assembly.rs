//! Timestamp-correct transcript and subtitle reassembly.
//!
//! Takes one segment's chunks, each with relative offsets and (where
//! transcription succeeded) text, shifts them onto the absolute timeline by
//! the segment's base offset, and renders a flat transcript plus an SRT
//! subtitle document. Chunks without text are skipped; subtitle indices are
//! reassigned over the retained entries so the numbering stays gap-free.

use std::fmt::Write as _;

use tracing::warn;

use crate::domain::format_srt;

/// One chunk ready for assembly: relative offsets plus its transcribed
/// text, or `None` when transcription failed for that chunk.
#[derive(Debug, Clone)]
pub struct ResolvedChunk {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: Option<String>,
}

/// Rendered output for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOutput {
    /// Retained texts joined with newlines.
    pub transcript: String,

    /// Full SRT document.
    pub subtitles: String,

    pub retained: usize,
    pub skipped: usize,
}

/// Assemble one segment. `base_ms` is the segment's start within the
/// original file; chunk offsets are relative to the segment.
pub fn assemble(base_ms: u64, mut chunks: Vec<ResolvedChunk>) -> AssemblyOutput {
    // Inputs should already be ordered; sort defensively.
    chunks.sort_by_key(|c| c.start_ms);

    let mut transcript_lines = Vec::new();
    let mut subtitles = String::new();
    let mut skipped = 0;
    let mut index = 0usize;

    for chunk in &chunks {
        let text = match &chunk.text {
            Some(t) => t,
            None => {
                warn!(
                    start_ms = chunk.start_ms,
                    end_ms = chunk.end_ms,
                    "chunk has no transcription, skipping"
                );
                skipped += 1;
                continue;
            }
        };

        let abs_start = base_ms + chunk.start_ms;
        let abs_end = base_ms + chunk.end_ms;
        index += 1;

        transcript_lines.push(text.as_str());
        let _ = write!(
            subtitles,
            "{}\n{} --> {}\n{}\n\n",
            index,
            format_srt(abs_start),
            format_srt(abs_end),
            text
        );
    }

    AssemblyOutput {
        transcript: transcript_lines.join("\n"),
        subtitles,
        retained: index,
        skipped,
    }
}
