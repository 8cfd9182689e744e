//! Image generation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ApiClient, ensure_success};
use crate::config::Config;
use crate::{Error, Result};

/// Style appended to every prompt of an illustrated story
pub const IMAGE_STYLE_SUFFIX: &str =
    ", children's book illustration style, colorful doodles, cute characters, happy mood";

/// Output image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    /// 1024x1024
    #[default]
    Square,
    /// 1024x1792
    Portrait,
    /// 1792x1024
    Landscape,
}

impl ImageSize {
    /// Wire value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Portrait => "1024x1792",
            Self::Landscape => "1792x1024",
        }
    }

    /// Parse from a wire value or a shape name
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1024x1024" | "square" => Some(Self::Square),
            "1024x1792" | "portrait" => Some(Self::Portrait),
            "1792x1024" | "landscape" => Some(Self::Landscape),
            _ => None,
        }
    }
}

/// Rendering quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

impl ImageQuality {
    /// Wire value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Hd => "hd",
        }
    }

    /// Parse from a wire value
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "hd" => Some(Self::Hd),
            _ => None,
        }
    }
}

/// Generates images from text prompts
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image, returning its URL
    ///
    /// # Errors
    ///
    /// Returns error if generation fails
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate one image per prompt, in order, with the story style appended
    ///
    /// Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first generation error
    async fn generate_many(&self, prompts: &[String]) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(prompts.len());
        for (index, prompt) in prompts.iter().enumerate() {
            let styled = format!("{prompt}{IMAGE_STYLE_SUFFIX}");
            let url = self.generate(&styled).await.map_err(|e| {
                tracing::error!(index, error = %e, "image generation failed");
                e
            })?;
            urls.push(url);
        }
        Ok(urls)
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'static str,
    quality: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// `images/generations` client
#[derive(Debug, Clone)]
pub struct ImageClient {
    api: ApiClient,
    model: String,
    size: ImageSize,
    quality: ImageQuality,
}

impl ImageClient {
    /// Create a client with explicit settings
    pub fn new(api: ApiClient, model: impl Into<String>, size: ImageSize, quality: ImageQuality) -> Self {
        Self {
            api,
            model: model.into(),
            size,
            quality,
        }
    }

    /// Create a client from configuration
    #[must_use]
    pub fn from_config(api: ApiClient, config: &Config) -> Self {
        Self::new(
            api,
            config.image.model.clone(),
            config.image.size,
            config.image.quality,
        )
    }

    /// Same client with a different size
    #[must_use]
    pub const fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Same client with a different quality
    #[must_use]
    pub const fn with_quality(mut self, quality: ImageQuality) -> Self {
        self.quality = quality;
        self
    }
}

#[async_trait]
impl ImageGenerator for ImageClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ImageRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: self.size.as_str(),
            quality: self.quality.as_str(),
        };

        tracing::debug!(
            model = %self.model,
            size = request.size,
            quality = request.quality,
            "generating image"
        );

        let response = self
            .api
            .post("images/generations")?
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(response, "images/generations").await?;

        let body = response.text().await?;
        let url = parse_image_body(&body)?;
        tracing::info!(url = %url, "image generated");
        Ok(url)
    }
}

fn parse_image_body(body: &str) -> Result<String> {
    serde_json::from_str::<ImageResponse>(body)
        .ok()
        .and_then(|r| r.data.into_iter().next())
        .and_then(|d| d.url)
        .ok_or_else(|| Error::MalformedResponse(body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_size_parse() {
        assert_eq!(ImageSize::parse("1792x1024"), Some(ImageSize::Landscape));
        assert_eq!(ImageSize::parse("Portrait"), Some(ImageSize::Portrait));
        assert_eq!(ImageSize::parse("512x512"), None);
        assert_eq!(ImageSize::default().as_str(), "1024x1024");
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!(ImageQuality::parse("HD"), Some(ImageQuality::Hd));
        assert_eq!(ImageQuality::parse("ultra"), None);
    }

    #[test]
    fn test_parse_image_body() {
        let body = r#"{"created":1,"data":[{"url":"https://img.example/1.png"}]}"#;
        assert_eq!(parse_image_body(body).unwrap(), "https://img.example/1.png");
        assert!(matches!(
            parse_image_body(r#"{"data":[]}"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    struct Recorder {
        prompts: Mutex<Vec<String>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl ImageGenerator for Recorder {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let mut prompts = self.prompts.lock().unwrap();
            if self.fail_at == Some(prompts.len()) {
                return Err(Error::remote(500, "boom"));
            }
            prompts.push(prompt.to_string());
            Ok(format!("https://img/{}", prompts.len()))
        }
    }

    #[tokio::test]
    async fn test_generate_many_appends_style() {
        let recorder = Recorder {
            prompts: Mutex::new(Vec::new()),
            fail_at: None,
        };
        let urls = recorder
            .generate_many(&["a fox".to_string(), "a hen".to_string()])
            .await
            .unwrap();

        assert_eq!(urls, vec!["https://img/1", "https://img/2"]);
        let prompts = recorder.prompts.lock().unwrap();
        assert_eq!(prompts[0], format!("a fox{IMAGE_STYLE_SUFFIX}"));
    }

    #[tokio::test]
    async fn test_generate_many_stops_at_first_failure() {
        let recorder = Recorder {
            prompts: Mutex::new(Vec::new()),
            fail_at: Some(1),
        };
        let prompts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        assert!(recorder.generate_many(&prompts).await.is_err());
        assert_eq!(recorder.prompts.lock().unwrap().len(), 1);
    }
}
