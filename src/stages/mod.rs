//! The five pipeline stages, each a [`StageHandler`] plugged into the
//! generic worker loop, plus the stable per-job directory layout they share.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::core::{JobStore, StageHandler, StageWorker, WorkerConfig};
use crate::domain::Stage;
use crate::inference::HttpBackend;

pub mod assembler;
pub mod chunker;
pub mod cleaner;
pub mod converter;
pub mod transcriber;

pub use assembler::AssemblerStage;
pub use chunker::ChunkerStage;
pub use cleaner::CleanerStage;
pub use converter::ConverterStage;
pub use transcriber::TranscriberStage;

/// File and directory names of the per-job layout. External browsers and
/// analytics read these paths, so they are part of the stable interface.
pub const CHUNKS_MAPPING_FILE: &str = "chunks_mapping.json";
pub const TEXT_MAPPING_FILE: &str = "text_mapping.json";
pub const AUDIO_CHUNKS_DIR: &str = "audio_chunks";
pub const TEXT_CHUNKS_DIR: &str = "text_chunks";
pub const ASSEMBLED_DIR: &str = "assembled_result";

/// Directory name for one segment of a job.
pub fn segment_dir_name(index: u32) -> String {
    format!("segment_{}", index)
}

/// Name of the converter's canonical WAV output for a source file.
pub(crate) fn canonical_wav_name(source_filename: &str) -> String {
    let stem = source_filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(source_filename);
    format!("{}.wav", stem)
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    json.push('\n');
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Build the worker for one stage, wired to the shared data directory and
/// the configured inference backend.
pub fn worker_for(stage: Stage, config: &PipelineConfig) -> StageWorker {
    let store = JobStore::new(&config.data_dir);

    let handler: Box<dyn StageHandler> = match stage {
        Stage::Converter => Box::new(ConverterStage::new(store)),
        Stage::Chunker => Box::new(ChunkerStage::new(store, config.segmentation.clone())),
        Stage::Transcriber => Box::new(TranscriberStage::new(
            store,
            Arc::new(HttpBackend::new(config.api_url.clone())),
        )),
        Stage::Assembler => Box::new(AssemblerStage::new(store)),
        Stage::Cleaner => Box::new(CleanerStage::new(store)),
    };

    StageWorker::new(
        &config.data_dir,
        handler,
        WorkerConfig {
            poll_interval: config.poll_interval,
            max_attempts: config.max_attempts,
        },
    )
}
