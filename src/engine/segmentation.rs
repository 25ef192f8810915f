//! Silence-adaptive audio segmentation.
//!
//! Splits a PCM buffer into bounded-length chunks cut at detected silence.
//! Each candidate window is searched for silence runs of a required length;
//! the requirement shrinks step by step until a run is found or the floor is
//! reached, at which point the window is hard-cut at its right edge. The cut
//! point is always past the cursor, so the walk terminates.

use tracing::{debug, trace};

use crate::audio::{dbfs, PcmAudio};
use crate::domain::ChunkSpan;

/// Tunables for the silence search.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Hard upper bound on a chunk's duration in milliseconds.
    pub max_segment_ms: u64,

    /// Silence-window length the search starts from.
    pub initial_silence_ms: u64,

    /// Loudness below which a millisecond frame counts as silence, in dBFS.
    pub silence_threshold_dbfs: f32,

    /// Floor for the shrinking search.
    pub min_silence_ms: u64,

    /// How much the required silence length shrinks per retry.
    pub silence_step_ms: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_segment_ms: 10_000,
            initial_silence_ms: 500,
            silence_threshold_dbfs: -40.0,
            min_silence_ms: 100,
            silence_step_ms: 100,
        }
    }
}

/// Split a segment's audio into contiguous chunk spans, each no longer than
/// `max_segment_ms`, preferring cuts at the end of the latest qualifying
/// silence run in each window.
pub fn split_by_silence(audio: &PcmAudio, config: &SegmentationConfig) -> Vec<ChunkSpan> {
    let total = audio.duration_ms();
    let silent = silence_profile(audio, config.silence_threshold_dbfs);

    let mut spans = Vec::new();
    let mut start = 0u64;

    while start < total {
        let window_end = (start + config.max_segment_ms).min(total);

        // A window that already reaches the end of the audio is taken whole;
        // otherwise look for the latest qualifying silence run inside it.
        let cut = if window_end == total {
            None
        } else {
            find_last_silence(&silent[start as usize..window_end as usize], config)
        };

        let actual_end = match cut {
            Some(rel) => start + rel as u64,
            None => window_end,
        };

        trace!(start, actual_end, window_end, "chunk boundary");
        spans.push(ChunkSpan {
            start_ms: start,
            end_ms: actual_end,
        });
        start = actual_end;
    }

    debug!(chunks = spans.len(), total_ms = total, "segmentation finished");
    spans
}

/// Millisecond offset of the end of the last silence run in the window that
/// is at least as long as the (shrinking) requirement, or `None` when no run
/// qualifies down to the floor.
///
/// A requirement already below the floor yields `None` without iterating,
/// so callers fall straight through to a hard cut.
fn find_last_silence(silent: &[bool], config: &SegmentationConfig) -> Option<usize> {
    let step = config.silence_step_ms.max(1);
    let floor = config.min_silence_ms.max(1);
    let mut required = config.initial_silence_ms;

    while required >= floor {
        if let Some(end) = last_run_end(silent, required as usize) {
            return Some(end);
        }
        required = required.checked_sub(step)?;
    }

    None
}

/// End offset of the last maximal silent run of at least `min_len` frames.
fn last_run_end(silent: &[bool], min_len: usize) -> Option<usize> {
    if min_len == 0 {
        return None;
    }

    let mut best = None;
    let mut run_start = None;

    for (i, &is_silent) in silent.iter().enumerate() {
        match (is_silent, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(started)) => {
                if i - started >= min_len {
                    best = Some(i);
                }
                run_start = None;
            }
            _ => {}
        }
    }

    if let Some(started) = run_start {
        if silent.len() - started >= min_len {
            best = Some(silent.len());
        }
    }

    best
}

/// Classify every millisecond frame of the buffer as silent or loud.
fn silence_profile(audio: &PcmAudio, threshold_dbfs: f32) -> Vec<bool> {
    let total = audio.duration_ms() as usize;
    (0..total)
        .map(|ms| {
            let a = audio.sample_at(ms as u64);
            let b = audio.sample_at(ms as u64 + 1);
            dbfs(&audio.samples[a..b]) < threshold_dbfs
        })
        .collect()
}
