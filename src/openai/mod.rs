//! Clients for the OpenAI-compatible HTTP API
//!
//! All requests authenticate through the shared [`KeyStore`], which is
//! consulted per request so a newly entered or overridden key applies
//! immediately. No request is retried automatically.

mod completion;
mod image;
pub mod payload;
pub mod sse;
mod speech;
mod story;
mod transcription;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::config::Config;
use crate::credentials::{Credential, KeyStore};
use crate::{Error, Result};

pub use completion::{ChunkCallback, Completion, CompletionClient, CompletionOptions};
pub use image::{IMAGE_STYLE_SUFFIX, ImageClient, ImageGenerator, ImageQuality, ImageSize};
pub use payload::{Payload, parse_structured};
pub use speech::{SpeechClient, SpeechSynthesizer};
pub use story::{Illustrations, StoryIllustrator};
pub use transcription::TranscriptionClient;

/// Beta header sent with project-scoped keys
pub const BETA_HEADER: &str = "openai-beta";

/// Value of the beta header
pub const BETA_HEADER_VALUE: &str = "assistants=v1";

/// Shared HTTP client, base URL and credential source
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    keys: KeyStore,
}

impl ApiClient {
    /// Create a client for the given base URL
    pub fn new(base_url: impl Into<String>, keys: KeyStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            keys,
        }
    }

    /// Create a client from configuration
    #[must_use]
    pub fn from_config(config: &Config, keys: KeyStore) -> Self {
        Self::new(config.api.base_url.clone(), keys)
    }

    /// Credential source used by this client
    #[must_use]
    pub const fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Full URL for an endpoint path
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Authenticated POST request builder
    ///
    /// # Errors
    ///
    /// Returns `MissingCredential` if no key is configured
    pub fn post(&self, path: &str) -> Result<reqwest::RequestBuilder> {
        let key = self.keys.get().ok_or_else(|| {
            tracing::error!("api key not found");
            Error::MissingCredential
        })?;
        Ok(self
            .http
            .post(self.url(path))
            .headers(auth_headers(&key)?))
    }
}

/// Authentication headers for a credential
///
/// Project keys also carry the beta header.
///
/// # Errors
///
/// Returns error if the key contains characters not allowed in a header
pub fn auth_headers(key: &Credential) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", key.expose()))
        .map_err(|_| Error::Config("api key contains invalid characters".to_string()))?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    if key.is_project_key() {
        headers.insert(BETA_HEADER, HeaderValue::from_static(BETA_HEADER_VALUE));
    }

    Ok(headers)
}

/// Pass through 2xx responses, turn anything else into `Error::Remote`
///
/// # Errors
///
/// Returns `Error::Remote` carrying status, category and error message
pub async fn ensure_success(response: reqwest::Response, endpoint: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = Error::remote(status.as_u16(), error_message(&body));
    tracing::error!(endpoint, status = %status, body = %body, "api request failed");
    Err(err)
}

/// Extract `error.message` from an API error body, falling back to the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_key_gets_beta_header() {
        let key = Credential::new("sk-proj-abcdefghijklmnopqrstuvwxyz");
        let headers = auth_headers(&key).unwrap();
        assert_eq!(headers.get(BETA_HEADER).unwrap(), BETA_HEADER_VALUE);
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer sk-proj-abcdefghijklmnopqrstuvwxyz"
        );
    }

    #[test]
    fn test_short_project_key_gets_beta_header() {
        let headers = auth_headers(&Credential::new("sk-proj-x1")).unwrap();
        assert_eq!(headers.get(BETA_HEADER).unwrap(), BETA_HEADER_VALUE);
    }

    #[test]
    fn test_standard_key_has_no_beta_header() {
        let key = Credential::new("sk-abcdefghijklmnopqrstuvwxyz");
        let headers = auth_headers(&key).unwrap();
        assert!(headers.get(BETA_HEADER).is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Rate limit reached"}}"#),
            "Rate limit reached"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_missing_key_fails_before_request() {
        let api = ApiClient::new("http://127.0.0.1:9", KeyStore::in_memory(None));
        assert!(matches!(api.post("chat/completions"), Err(Error::MissingCredential)));
    }

    #[test]
    fn test_url_joining() {
        let api = ApiClient::new("http://localhost/v1/", KeyStore::in_memory(None));
        assert_eq!(api.url("/audio/speech"), "http://localhost/v1/audio/speech");
    }
}
