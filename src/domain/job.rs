//! The per-job metadata record.
//!
//! One `Job` exists per submitted audio file, serialized as `job.json` in the
//! job's directory. The record is rewritten in place (atomically) by each
//! stage; it is never appended to and never deleted by the pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::Stage;
use super::timecode::{parse_hms, TimecodeError};

/// A user-requested time range within the original audio, as `HH:MM:SS`
/// strings. An empty `start` means the beginning of the file; an empty `end`
/// means the end of the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentRequest {
    #[serde(default)]
    pub start: String,

    #[serde(default)]
    pub end: String,
}

impl SegmentRequest {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Requested start offset in milliseconds; empty means 0.
    pub fn start_ms(&self) -> Result<u64, TimecodeError> {
        let trimmed = self.start.trim();
        if trimmed.is_empty() {
            Ok(0)
        } else {
            parse_hms(trimmed)
        }
    }

    /// Requested end offset in milliseconds; `None` means end-of-file.
    pub fn end_ms(&self) -> Result<Option<u64>, TimecodeError> {
        let trimmed = self.end.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            parse_hms(trimmed).map(Some)
        }
    }
}

/// One submitted audio file's end-to-end unit of work.
///
/// Unknown fields are rejected at parse time so a drifted record surfaces as
/// a loud error instead of silently passing through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    /// Opaque identifier, equal to the job's directory name.
    pub id: String,

    /// File name of the uploaded audio inside the job directory.
    pub source_filename: String,

    /// Language key forwarded to the inference backend.
    pub language_key: String,

    /// When the job was created.
    pub submitted_at: DateTime<Utc>,

    /// Requested time ranges; empty means "whole file".
    #[serde(default)]
    pub requested_segments: Vec<SegmentRequest>,

    /// Completion time per stage. All five keys are present from creation;
    /// each stage sets exactly its own key.
    pub stage_timestamps: BTreeMap<Stage, Option<DateTime<Utc>>>,
}

impl Job {
    /// Create a fresh record with every stage timestamp unset.
    pub fn new(
        id: impl Into<String>,
        source_filename: impl Into<String>,
        language_key: impl Into<String>,
        requested_segments: Vec<SegmentRequest>,
    ) -> Self {
        let stage_timestamps = Stage::ALL.iter().map(|&s| (s, None)).collect();
        Self {
            id: id.into(),
            source_filename: source_filename.into(),
            language_key: language_key.into(),
            submitted_at: Utc::now(),
            requested_segments,
            stage_timestamps,
        }
    }

    /// Segment indices to process, derived from the record rather than from
    /// directory names. Index 0 is the implicit whole-file segment used when
    /// no ranges were requested; user ranges are numbered from 1 in request
    /// order.
    pub fn segment_indices(&self) -> Vec<u32> {
        if self.requested_segments.is_empty() {
            vec![0]
        } else {
            (1..=self.requested_segments.len() as u32).collect()
        }
    }

    /// The request backing a segment index, if any. The whole-file segment 0
    /// has no request and yields `None`.
    pub fn segment_request(&self, index: u32) -> Option<&SegmentRequest> {
        if index == 0 {
            None
        } else {
            self.requested_segments.get(index as usize - 1)
        }
    }

    /// Completion timestamp for one stage.
    pub fn stage_completed_at(&self, stage: Stage) -> Option<DateTime<Utc>> {
        self.stage_timestamps.get(&stage).copied().flatten()
    }

    /// A job is finished once the cleaner has stamped it.
    pub fn is_complete(&self) -> bool {
        self.stage_completed_at(Stage::Cleaner).is_some()
    }
}
