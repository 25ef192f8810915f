//! Configuration for the pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SCRIBEPIPE_DATA_DIR, SCRIBEPIPE_API_URL)
//! 2. Config file (.scribepipe/config.yaml)
//! 3. Defaults (~/.scribepipe/data, local inference service)
//!
//! Config file discovery searches the current directory and parents for
//! `.scribepipe/config.yaml`; a relative `data_dir` in the file is resolved
//! against the config file's parent directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::SegmentationConfig;

const DEFAULT_API_URL: &str = "http://127.0.0.1:6001";
const DEFAULT_POLL_SECS: u64 = 10;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub inference: Option<InferenceSection>,
    #[serde(default)]
    pub chunking: Option<ChunkingSection>,
    #[serde(default)]
    pub retry: Option<RetrySection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InferenceSection {
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkingSection {
    pub max_segment_ms: Option<u64>,
    pub initial_silence_ms: Option<u64>,
    pub silence_threshold_dbfs: Option<f32>,
    pub min_silence_ms: Option<u64>,
    pub silence_step_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrySection {
    /// Consecutive per-stage failures before a job is dead-lettered.
    /// Absent means retry forever.
    pub max_attempts: Option<u32>,
}

/// Resolved configuration used by the CLI and workers.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding the queues and all job directories.
    pub data_dir: PathBuf,

    /// Poll period shared by every stage worker.
    pub poll_interval: Duration,

    /// Base URL of the speech-to-text service.
    pub api_url: String,

    /// Chunker tunables.
    pub segmentation: SegmentationConfig,

    /// Retry bound; `None` retries forever.
    pub max_attempts: Option<u32>,

    /// Path to the config file, if one was found.
    pub config_file: Option<PathBuf>,
}

impl PipelineConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        let config_file = find_config_file();

        let file = match &config_file {
            Some(path) => Some(load_config_file(path)?),
            None => None,
        };

        let default_data_dir = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".scribepipe")
            .join("data");

        let data_dir = if let Ok(env_dir) = std::env::var("SCRIBEPIPE_DATA_DIR") {
            PathBuf::from(env_dir)
        } else if let (Some(path), Some(dir)) = (
            &config_file,
            file.as_ref().and_then(|f| f.data_dir.as_deref()),
        ) {
            let base = path.parent().unwrap_or(Path::new("."));
            resolve_path(base, dir)
        } else {
            default_data_dir
        };

        let api_url = if let Ok(env_url) = std::env::var("SCRIBEPIPE_API_URL") {
            env_url
        } else {
            file.as_ref()
                .and_then(|f| f.inference.as_ref())
                .and_then(|i| i.api_url.clone())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
        };

        let poll_secs = file
            .as_ref()
            .and_then(|f| f.poll_interval_secs)
            .unwrap_or(DEFAULT_POLL_SECS);

        let mut segmentation = SegmentationConfig::default();
        if let Some(chunking) = file.as_ref().and_then(|f| f.chunking.as_ref()) {
            if let Some(v) = chunking.max_segment_ms {
                segmentation.max_segment_ms = v;
            }
            if let Some(v) = chunking.initial_silence_ms {
                segmentation.initial_silence_ms = v;
            }
            if let Some(v) = chunking.silence_threshold_dbfs {
                segmentation.silence_threshold_dbfs = v;
            }
            if let Some(v) = chunking.min_silence_ms {
                segmentation.min_silence_ms = v;
            }
            if let Some(v) = chunking.silence_step_ms {
                segmentation.silence_step_ms = v;
            }
        }

        let max_attempts = file
            .as_ref()
            .and_then(|f| f.retry.as_ref())
            .and_then(|r| r.max_attempts);

        Ok(Self {
            data_dir,
            poll_interval: Duration::from_secs(poll_secs),
            api_url,
            segmentation,
            max_attempts,
            config_file,
        })
    }

    /// A config rooted at an explicit data directory, with defaults for
    /// everything else. Used by tests and tools that bypass discovery.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            api_url: DEFAULT_API_URL.to_string(),
            segmentation: SegmentationConfig::default(),
            max_attempts: None,
            config_file: None,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".scribepipe").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
data_dir: ./data
poll_interval_secs: 5
inference:
  api_url: http://inference.local:6001
chunking:
  max_segment_ms: 20000
  silence_threshold_dbfs: -35.5
retry:
  max_attempts: 5
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.data_dir, Some("./data".to_string()));
        assert_eq!(config.poll_interval_secs, Some(5));
        assert_eq!(
            config.inference.unwrap().api_url,
            Some("http://inference.local:6001".to_string())
        );
        let chunking = config.chunking.unwrap();
        assert_eq!(chunking.max_segment_ms, Some(20_000));
        assert_eq!(chunking.silence_threshold_dbfs, Some(-35.5));
        assert!(chunking.min_silence_ms.is_none());
        assert_eq!(config.retry.unwrap().max_attempts, Some(5));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project/.scribepipe");
        assert_eq!(
            resolve_path(&base, "./data"),
            PathBuf::from("/home/user/project/.scribepipe/./data")
        );
        assert_eq!(
            resolve_path(&base, "/var/scribepipe"),
            PathBuf::from("/var/scribepipe")
        );
    }

    #[test]
    fn test_with_data_dir_defaults() {
        let config = PipelineConfig::with_data_dir("/tmp/pipe");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/pipe"));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.segmentation.max_segment_ms, 10_000);
        assert!(config.max_attempts.is_none());
    }
}
