//! Text-to-speech synthesis

use async_trait::async_trait;
use serde::Serialize;

use super::{ApiClient, ensure_success};
use crate::config::Config;
use crate::{Error, Result};

/// Turns text into playable audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

/// `audio/speech` client
#[derive(Debug, Clone)]
pub struct SpeechClient {
    api: ApiClient,
    model: String,
    voice: String,
    speed: f32,
}

impl SpeechClient {
    /// Create a client for an explicit model and voice
    pub fn new(api: ApiClient, model: impl Into<String>, voice: impl Into<String>, speed: f32) -> Self {
        Self {
            api,
            model: model.into(),
            voice: voice.into(),
            speed,
        }
    }

    /// Create a client from configuration
    #[must_use]
    pub fn from_config(api: ApiClient, config: &Config) -> Self {
        Self::new(
            api,
            config.voice.tts_model.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
        )
    }

    /// Same client with a different voice
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Voice used for synthesis
    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("nothing to synthesize".to_string()));
        }

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        tracing::debug!(voice = %self.voice, chars = text.len(), "synthesizing speech");

        let response = self.api.post("audio/speech")?.json(&request).send().await?;
        let response = ensure_success(response, "audio/speech").await?;

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}
