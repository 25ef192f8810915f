//! Converter stage: normalize the uploaded audio into canonical mono PCM.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use crate::audio;
use crate::core::{joblog, JobStore, StageHandler};
use crate::domain::Stage;

use super::canonical_wav_name;

/// Reads the source audio through the decoder seam and writes the canonical
/// 16-bit mono WAV the chunker consumes.
pub struct ConverterStage {
    store: JobStore,
}

impl ConverterStage {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for ConverterStage {
    fn stage(&self) -> Stage {
        Stage::Converter
    }

    async fn process(&self, job_id: &str) -> Result<()> {
        let job = self.store.load(job_id)?;
        let job_dir = self.store.job_dir(job_id);

        joblog::append(&job_dir, Stage::Converter, "starting conversion");

        if job.source_filename.trim().is_empty() {
            bail!("job {} record has no source filename", job_id);
        }

        let source_path = job_dir.join(&job.source_filename);
        if !source_path.is_file() {
            bail!("source audio not found: {}", source_path.display());
        }

        let sound = audio::read_wav(&source_path)?;
        let wav_name = canonical_wav_name(&job.source_filename);
        audio::write_wav(&job_dir.join(&wav_name), &sound)?;

        joblog::append(
            &job_dir,
            Stage::Converter,
            &format!(
                "wrote {} ({} ms at {} Hz)",
                wav_name,
                sound.duration_ms(),
                sound.sample_rate
            ),
        );
        info!(job = %job_id, wav = %wav_name, "conversion finished");

        Ok(())
    }
}
