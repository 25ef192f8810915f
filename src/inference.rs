//! Client for the external speech-to-text service.
//!
//! The service is a black box: one multipart POST per chunk carrying the
//! audio bytes and a language key, answering `{"transcription": "..."}`.
//! The trait seam exists so tests can substitute a fake backend.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors from the transcription backend
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("transcription request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("transcription backend error: {0}")]
    Backend(String),
}

/// A speech-to-text backend turning one chunk's audio into text.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        lang_key: &str,
    ) -> Result<String, InferenceError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    transcription: String,
}

/// HTTP backend posting to `{base_url}/transcribe`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for HttpBackend {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        lang_key: &str,
    ) -> Result<String, InferenceError> {
        let url = format!("{}/transcribe", self.base_url);
        debug!(%url, file = %file_name, lang = %lang_key, "sending chunk for transcription");

        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")?;
        let form = Form::new()
            .part("audio", part)
            .text("lang_key", lang_key.to_string());

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body: TranscriptionResponse = response.json().await?;
        Ok(body.transcription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://127.0.0.1:6001/");
        assert_eq!(backend.base_url, "http://127.0.0.1:6001");
    }

    #[test]
    fn test_response_parsing() {
        let body: TranscriptionResponse =
            serde_json::from_str(r#"{"transcription": "hello world"}"#).unwrap();
        assert_eq!(body.transcription, "hello world");
    }
}
