//! Command-line interface for scribepipe.
//!
//! Provides commands for submitting jobs, running stage workers (one per
//! process or all five in one), and checking a job's progress.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::PipelineConfig;
use crate::core::JobStore;
use crate::domain::{SegmentRequest, Stage};
use crate::intake::{submit_job, JobRequest};
use crate::stages::worker_for;

/// scribepipe - crash-tolerant audio transcription pipeline
#[derive(Parser, Debug)]
#[command(name = "scribepipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit an audio file to the pipeline
    Submit {
        /// Path to the audio file
        audio: PathBuf,

        /// Language key forwarded to the inference service
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// Time range to transcribe, as HH:MM:SS-HH:MM:SS (repeatable;
        /// omit for the whole file)
        #[arg(short, long = "segment")]
        segments: Vec<String>,
    },

    /// Run a single stage worker (one stage per process)
    Worker {
        /// Stage to run
        stage: StageArg,
    },

    /// Run all five stage workers in this process
    Run,

    /// Show a job's per-stage completion timestamps
    Status {
        /// Job ID (the job's directory name)
        job_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Stage selector for the CLI (maps to Stage)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StageArg {
    Converter,
    Chunker,
    Transcriber,
    Assembler,
    Cleaner,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Converter => Stage::Converter,
            StageArg::Chunker => Stage::Chunker,
            StageArg::Transcriber => Stage::Transcriber,
            StageArg::Assembler => Stage::Assembler,
            StageArg::Cleaner => Stage::Cleaner,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = PipelineConfig::load()?;

        match self.command {
            Commands::Submit {
                audio,
                lang,
                segments,
            } => submit(&config, audio, lang, segments),
            Commands::Worker { stage } => run_worker(&config, stage.into()).await,
            Commands::Run => run_all(&config).await,
            Commands::Status { job_id } => show_status(&config, &job_id),
            Commands::Config => show_config(&config),
        }
    }
}

fn submit(
    config: &PipelineConfig,
    audio: PathBuf,
    lang: String,
    segments: Vec<String>,
) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;

    let segments = segments
        .iter()
        .map(|raw| parse_segment_arg(raw))
        .collect::<Result<Vec<_>>>()?;

    let job_id = submit_job(
        config,
        &JobRequest {
            source_path: audio,
            language_key: lang,
            segments,
        },
    )?;

    println!("{}", job_id);
    Ok(())
}

/// Parse a `HH:MM:SS-HH:MM:SS` range argument; either side may be empty.
fn parse_segment_arg(raw: &str) -> Result<SegmentRequest> {
    let Some((start, end)) = raw.split_once('-') else {
        bail!("invalid segment '{}': expected HH:MM:SS-HH:MM:SS", raw);
    };
    Ok(SegmentRequest::new(start.trim(), end.trim()))
}

async fn run_worker(config: &PipelineConfig, stage: Stage) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)?;
    worker_for(stage, config).run().await
}

async fn run_all(config: &PipelineConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)?;

    let mut handles = Vec::new();
    for stage in Stage::ALL {
        let worker = worker_for(stage, config);
        handles.push(tokio::spawn(worker.run()));
    }

    // Workers run forever; surface the first one that dies.
    for handle in handles {
        handle.await??;
    }
    Ok(())
}

fn show_status(config: &PipelineConfig, job_id: &str) -> Result<()> {
    let store = JobStore::new(&config.data_dir);
    let job = store.load(job_id)?;

    println!("Job:       {}", job.id);
    println!("Source:    {}", job.source_filename);
    println!("Language:  {}", job.language_key);
    println!("Submitted: {}", job.submitted_at.to_rfc3339());
    if job.requested_segments.is_empty() {
        println!("Segments:  whole file");
    } else {
        for (i, seg) in job.requested_segments.iter().enumerate() {
            println!(
                "Segment {}: {} - {}",
                i + 1,
                if seg.start.trim().is_empty() { "start" } else { &seg.start },
                if seg.end.trim().is_empty() { "end" } else { &seg.end },
            );
        }
    }
    println!();
    for stage in Stage::ALL {
        match job.stage_completed_at(stage) {
            Some(ts) => println!("  {:<12} {}", stage, ts.to_rfc3339()),
            None => println!("  {:<12} pending", stage),
        }
    }

    Ok(())
}

fn show_config(config: &PipelineConfig) -> Result<()> {
    println!("data_dir:        {}", config.data_dir.display());
    println!("poll_interval:   {}s", config.poll_interval.as_secs());
    println!("api_url:         {}", config.api_url);
    println!(
        "max_attempts:    {}",
        config
            .max_attempts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );
    println!("chunking:");
    println!("  max_segment_ms:         {}", config.segmentation.max_segment_ms);
    println!("  initial_silence_ms:     {}", config.segmentation.initial_silence_ms);
    println!("  silence_threshold_dbfs: {}", config.segmentation.silence_threshold_dbfs);
    println!("  min_silence_ms:         {}", config.segmentation.min_silence_ms);
    println!("  silence_step_ms:        {}", config.segmentation.silence_step_ms);
    match &config.config_file {
        Some(path) => println!("config_file:     {}", path.display()),
        None => println!("config_file:     (defaults)"),
    }

    Ok(())
}
