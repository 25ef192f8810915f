//! The five pipeline stages and their wiring order.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One step of the processing pipeline. Each stage owns exactly one inbound
/// queue and hands finished jobs to the next stage's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Normalizes the uploaded audio into canonical mono PCM WAV
    Converter,

    /// Splits audio into bounded chunks cut at detected silence
    Chunker,

    /// Sends each chunk to the speech-to-text backend
    Transcriber,

    /// Merges transcribed chunks into transcript + subtitle files
    Assembler,

    /// Removes intermediate audio artifacts
    Cleaner,
}

impl Stage {
    /// All stages, in pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::Converter,
        Stage::Chunker,
        Stage::Transcriber,
        Stage::Assembler,
        Stage::Cleaner,
    ];

    /// Stable name used for queue files, record keys, and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Converter => "converter",
            Stage::Chunker => "chunker",
            Stage::Transcriber => "transcriber",
            Stage::Assembler => "assembler",
            Stage::Cleaner => "cleaner",
        }
    }

    /// The stage that consumes this stage's output; the cleaner has none.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Converter => Some(Stage::Chunker),
            Stage::Chunker => Some(Stage::Transcriber),
            Stage::Transcriber => Some(Stage::Assembler),
            Stage::Assembler => Some(Stage::Cleaner),
            Stage::Cleaner => None,
        }
    }

    /// Path of this stage's inbound queue file under the data directory.
    pub fn queue_path(self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.queue", self.as_str()))
    }

    /// Path of this stage's dead-letter queue file (bounded-retry overflow).
    pub fn dead_queue_path(self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.dead", self.as_str()))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order() {
        let mut stage = Stage::Converter;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited, Stage::ALL);
    }

    #[test]
    fn test_cleaner_is_terminal() {
        assert_eq!(Stage::Cleaner.next(), None);
    }

    #[test]
    fn test_queue_paths() {
        let dir = Path::new("/data");
        assert_eq!(
            Stage::Transcriber.queue_path(dir),
            PathBuf::from("/data/transcriber.queue")
        );
        assert_eq!(
            Stage::Transcriber.dead_queue_path(dir),
            PathBuf::from("/data/transcriber.dead")
        );
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Stage::Assembler).unwrap();
        assert_eq!(json, "\"assembler\"");
        let parsed: Stage = serde_json::from_str("\"chunker\"").unwrap();
        assert_eq!(parsed, Stage::Chunker);
    }
}
