//! Chat completions, buffered or streamed

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ApiClient, ensure_success, sse};
use crate::config::Config;
use crate::{Error, Result};

/// Per-chunk callback for streamed completions
pub type ChunkCallback<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Options for a single completion call
///
/// Supplying a chunk callback switches the request to streaming mode.
#[derive(Default)]
pub struct CompletionOptions<'a> {
    /// Completion length cap (client default when `None`)
    pub max_tokens: Option<u32>,
    /// Sampling temperature (client default when `None`)
    pub temperature: Option<f32>,
    on_chunk: Option<ChunkCallback<'a>>,
}

impl<'a> CompletionOptions<'a> {
    /// Options using the client defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the completion length cap
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Override the sampling temperature
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Stream the completion, invoking `on_chunk` once per arriving fragment
    #[must_use]
    pub fn streaming(mut self, on_chunk: ChunkCallback<'a>) -> Self {
        self.on_chunk = Some(on_chunk);
        self
    }

    /// Whether streaming was requested
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.on_chunk.is_some()
    }

    /// Take the chunk callback out of the options
    pub fn take_chunk_callback(&mut self) -> Option<ChunkCallback<'a>> {
        self.on_chunk.take()
    }
}

impl std::fmt::Debug for CompletionOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionOptions")
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("streaming", &self.is_streaming())
            .finish()
    }
}

/// Produces assistant text from a system/user prompt pair
#[async_trait]
pub trait Completion: Send + Sync {
    /// Run one completion
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential`, `Remote` for non-2xx responses, or
    /// `MalformedResponse` when a buffered body lacks the completion text
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions<'_>,
    ) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completion client
#[derive(Debug, Clone)]
pub struct CompletionClient {
    api: ApiClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl CompletionClient {
    /// Create a client with explicit defaults
    pub fn new(api: ApiClient, model: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            api,
            model: model.into(),
            max_tokens,
            temperature,
        }
    }

    /// Create a client using the configured model and defaults
    #[must_use]
    pub fn from_config(api: ApiClient, config: &Config) -> Self {
        Self::new(
            api,
            config.llm.model.clone(),
            config.llm.max_tokens,
            config.llm.temperature,
        )
    }

    /// Model used for requests
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Completion for CompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        mut options: CompletionOptions<'_>,
    ) -> Result<String> {
        let on_chunk = options.take_chunk_callback();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            temperature: options.temperature.unwrap_or(self.temperature),
            stream: on_chunk.is_some(),
        };

        tracing::debug!(
            model = %self.model,
            max_tokens = request.max_tokens,
            stream = request.stream,
            prompt_chars = user_prompt.len(),
            "sending completion request"
        );

        let response = self
            .api
            .post("chat/completions")?
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "completion request failed");
                e
            })?;
        let response = ensure_success(response, "chat/completions").await?;

        if let Some(on_chunk) = on_chunk {
            return sse::accumulate(response.bytes_stream(), |text| on_chunk(text)).await;
        }

        let body = response.text().await?;
        let text = parse_completion_body(&body)?;
        tracing::debug!(chars = text.len(), "completion received");
        Ok(text)
    }
}

/// Extract `choices[0].message.content` from a buffered response body
///
/// # Errors
///
/// Returns `MalformedResponse` with the raw body if the shape is unexpected
pub fn parse_completion_body(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        tracing::warn!(error = %e, "failed to parse completion response");
        Error::MalformedResponse(body.to_string())
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| {
            tracing::warn!("completion response has no content");
            Error::MalformedResponse(body.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_body() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"A verb is an action word."}}]}"#;
        assert_eq!(parse_completion_body(body).unwrap(), "A verb is an action word.");
    }

    #[test]
    fn test_parse_completion_body_malformed() {
        assert!(matches!(
            parse_completion_body("not json"),
            Err(Error::MalformedResponse(raw)) if raw == "not json"
        ));
        assert!(matches!(
            parse_completion_body(r#"{"choices":[]}"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            max_tokens: 300,
            temperature: 0.5,
            stream: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 300);
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn test_options_builder() {
        let mut sink = |_: &str| {};
        let options = CompletionOptions::new()
            .max_tokens(10)
            .temperature(0.1)
            .streaming(&mut sink);
        assert!(options.is_streaming());
        assert_eq!(options.max_tokens, Some(10));
        assert!(!CompletionOptions::new().is_streaming());
    }
}
