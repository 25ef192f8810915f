//! scribepipe - crash-tolerant audio transcription pipeline
//!
//! Moves an audio file through five stages (convert → chunk → transcribe →
//! assemble → clean), each an independent polling worker. Workers coordinate
//! only through small file-backed queues and a per-job metadata record, so
//! any worker can crash and restart without losing work.
//!
//! # Architecture
//!
//! - Every stage owns one durable queue of job ids; `pop_all` claims the
//!   whole batch atomically and failures are written back for the next tick
//! - The job directory is the single source of truth; the record accumulates
//!   one completion timestamp per stage, stamped before hand-off
//! - Chunking cuts at detected silence with a shrinking-requirement search;
//!   assembly rebuilds the absolute timeline and emits transcript + SRT
//!
//! # Modules
//!
//! - `core`: queues, job records, and the generic stage worker
//! - `domain`: job/chunk/stage data structures and time codes
//! - `engine`: the segmentation and assembly algorithms
//! - `stages`: the five stage implementations
//! - `audio`, `inference`, `intake`, `config`, `cli`: supporting plumbing
//!
//! # Usage
//!
//! ```bash
//! # Submit a file, transcribing only a time range
//! scribepipe submit talk.wav --lang en --segment 00:00:10-00:00:40
//!
//! # Run one stage per process, or everything at once
//! scribepipe worker chunker
//! scribepipe run
//!
//! # Check progress
//! scribepipe status <job-id>
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod engine;
pub mod inference;
pub mod intake;
pub mod stages;

// Re-export main types at crate root for convenience
pub use config::PipelineConfig;
pub use core::{AtomicQueue, DrainReport, JobStore, StageHandler, StageWorker, WorkerConfig};
pub use domain::{ChunkEntry, ChunkSpan, Job, SegmentRequest, Stage, TextEntry};
pub use engine::{assemble, split_by_silence, AssemblyOutput, ResolvedChunk, SegmentationConfig};
pub use inference::{HttpBackend, TranscriptionBackend};
pub use intake::{submit_job, JobRequest};
