//! Whisper transcription of recorded utterances

use super::{ApiClient, ensure_success};
use crate::config::Config;
use crate::{Error, Result};

#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// `audio/transcriptions` client
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    api: ApiClient,
    model: String,
    language: String,
}

impl TranscriptionClient {
    /// Create a client for an explicit model and language
    pub fn new(api: ApiClient, model: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            api,
            model: model.into(),
            language: language.into(),
        }
    }

    /// Create a client from configuration
    #[must_use]
    pub fn from_config(api: ApiClient, config: &Config) -> Self {
        Self::new(api, config.voice.stt_model.clone(), config.voice.language.clone())
    }

    /// Transcribe WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns error if the upload fails or the response is malformed
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting transcription");

        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Recognition(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .api
            .post("audio/transcriptions")?
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;
        let response = ensure_success(response, "audio/transcriptions").await?;

        let body = response.text().await?;
        let result: TranscriptionResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            Error::MalformedResponse(body.clone())
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text.trim().to_string())
    }
}
