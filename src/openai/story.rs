//! Story illustration: split a story into scenes and draw them consistently

use std::fmt::Write as _;
use std::sync::Arc;

use super::completion::{Completion, CompletionOptions};
use super::image::ImageGenerator;
use super::payload::parse_structured;
use crate::{Error, Result};

/// Number of scenes per illustrated story
pub const SEGMENT_COUNT: usize = 4;

const STORY_MAX_TOKENS: u32 = 2000;

const SEGMENT_PROMPT: &str = "You are a helpful assistant that divides stories into segments for illustration. \
Given a story, divide it into exactly 4 segments of roughly equal length while ensuring each segment \
has a clear event or scene that could be illustrated. The segments should flow naturally and maintain \
the narrative structure. Return ONLY the 4 segments as a JSON array of strings, with no additional text.";

const IMAGE_PROMPT_PROMPT: &str = "You are a helpful assistant that creates consistent art prompts for children's story illustrations.
Given a full story and its 4 segments, create 4 detailed prompts that will generate consistent illustrations.

Important guidelines:
1. Extract character descriptions, settings, and mood from the whole story.
2. Ensure the same characters appear across all illustrations with consistent appearance.
3. Use consistent art style, colors, and background elements throughout.
4. Each prompt should focus on illustrating the key event in its corresponding segment.
5. All prompts should specify \"colorful children's book illustration with doodle style\"
6. Keep each prompt under 200 characters.

Return ONLY the 4 prompts as a JSON array of strings with no additional text.";

/// Everything produced for one story
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Illustrations {
    pub segments: Vec<String>,
    pub prompts: Vec<String>,
    pub image_urls: Vec<String>,
}

/// Turns a story into four consistent illustrations
pub struct StoryIllustrator {
    completion: Arc<dyn Completion>,
    images: Arc<dyn ImageGenerator>,
}

impl StoryIllustrator {
    pub fn new(completion: Arc<dyn Completion>, images: Arc<dyn ImageGenerator>) -> Self {
        Self { completion, images }
    }

    /// Split a story into scenes
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` if the model does not answer with a JSON
    /// array of strings
    pub async fn segments(&self, story: &str) -> Result<Vec<String>> {
        if story.trim().is_empty() {
            return Err(Error::InvalidInput("story is empty".to_string()));
        }

        let answer = self
            .completion
            .complete(
                SEGMENT_PROMPT,
                story,
                CompletionOptions::new().max_tokens(STORY_MAX_TOKENS),
            )
            .await?;
        let segments = parse_structured(&answer).into_string_list()?;
        tracing::debug!(count = segments.len(), "story segmented");
        Ok(segments)
    }

    /// Write one image prompt per scene, keeping characters and style consistent
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` unless exactly four segments are given, or
    /// `MalformedResponse` for a non-array answer
    pub async fn image_prompts(&self, story: &str, segments: &[String]) -> Result<Vec<String>> {
        if segments.len() != SEGMENT_COUNT {
            return Err(Error::InvalidInput(format!(
                "expected {SEGMENT_COUNT} segments, got {}",
                segments.len()
            )));
        }

        let mut user_prompt = format!("Full Story: {story}\n");
        for (i, segment) in segments.iter().enumerate() {
            let _ = write!(user_prompt, "\nSegment {}: {segment}", i + 1);
        }

        let answer = self
            .completion
            .complete(
                IMAGE_PROMPT_PROMPT,
                &user_prompt,
                CompletionOptions::new().max_tokens(STORY_MAX_TOKENS),
            )
            .await?;
        parse_structured(&answer).into_string_list()
    }

    /// Segment, prompt and draw a whole story
    ///
    /// # Errors
    ///
    /// Returns the first failure of any step
    pub async fn illustrate(&self, story: &str) -> Result<Illustrations> {
        let segments = self.segments(story).await?;
        let prompts = self.image_prompts(story, &segments).await?;
        let image_urls = self.images.generate_many(&prompts).await?;

        tracing::info!(images = image_urls.len(), "story illustrated");
        Ok(Illustrations {
            segments,
            prompts,
            image_urls,
        })
    }
}
