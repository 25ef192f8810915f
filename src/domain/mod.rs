//! Data structures shared across the pipeline: jobs, stages, chunks,
//! and time codes.

pub mod chunk;
pub mod job;
pub mod stage;
pub mod timecode;

pub use chunk::{ChunkEntry, ChunkSpan, TextEntry};
pub use job::{Job, SegmentRequest};
pub use stage::Stage;
pub use timecode::{format_hms, format_srt, parse_hms, TimecodeError};
