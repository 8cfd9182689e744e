//! Day-by-day study plans generated from chapter text

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::credentials::KeyStore;
use crate::openai::{Completion, CompletionOptions, Payload, parse_structured};
use crate::{Error, Result};

/// Shortest chapter text a plan is built from
pub const MIN_PLAN_CONTENT_CHARS: usize = 100;
/// Longer chapter text is cut to this many characters
pub const MAX_PLAN_CONTENT_CHARS: usize = 15_000;

const TRUNCATION_NOTE: &str = "... [Content truncated due to length]";
const PLAN_MAX_TOKENS: u32 = 3000;
const PLAN_TEMPERATURE: f32 = 0.3;

const PLAN_SYSTEM_PROMPT: &str = r#"You are an expert educational consultant. Generate a structured study plan based EXCLUSIVELY on the provided chapter text content. The response MUST be in JSON format.

JSON Structure Required:
{
  "chapterTitle": "Extracted or inferred chapter title",
  "duration": "Estimated total duration (e.g., '3 Days')",
  "structure": [
    {
      "day": 1,
      "title": "Focus for the day",
      "tasks": [
        {
          "name": "Specific task name",
          "duration": "Estimated time (e.g., '45 mins')",
          "details": "Detailed instructions referencing the chapter content",
          "completed": false
        }
      ]
    }
  ],
  "tips": ["Practical study tip relevant to the content"],
  "priorKnowledge": ["Concept or skill needed beforehand"],
  "completionPercentage": 0
}

Guidelines:
1. Base the plan strictly on the provided text.
2. Create a plan for approximately 3 days.
3. Break down tasks logically.
4. Ensure 'details' include specifics from the text.
5. List 2-4 relevant prerequisites if identifiable, otherwise empty array.
6. Provide 3-5 actionable study tips.
7. Return ONLY the valid JSON object, no extra text or markdown."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyTask {
    pub name: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyDay {
    pub day: u32,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<StudyTask>,
}

/// A generated plan with per-task progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub chapter_title: String,
    #[serde(default)]
    pub duration: String,
    pub structure: Vec<StudyDay>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub prior_knowledge: Vec<String>,
    #[serde(default)]
    pub completion_percentage: u8,
}

impl StudyPlan {
    /// Parse a plan out of model output
    ///
    /// The stored percentage is recomputed from the tasks.
    ///
    /// # Errors
    ///
    /// Returns `MalformedResponse` when no plan object can be read
    pub fn parse(text: &str) -> Result<Self> {
        let Payload::Structured(value) = parse_structured(text) else {
            return Err(Error::MalformedResponse(preview(text)));
        };
        let mut plan: Self = serde_json::from_value(value).map_err(|e| {
            tracing::debug!(error = %e, "study plan json has the wrong shape");
            Error::MalformedResponse(preview(text))
        })?;
        plan.completion_percentage = plan.progress();
        Ok(plan)
    }

    /// Completed tasks as a rounded percentage of all tasks
    #[must_use]
    pub fn progress(&self) -> u8 {
        let (done, total) = self
            .structure
            .iter()
            .flat_map(|day| &day.tasks)
            .fold((0usize, 0usize), |(done, total), task| {
                (done + usize::from(task.completed), total + 1)
            });
        if total == 0 {
            return 0;
        }
        u8::try_from((done * 200 + total) / (2 * total)).unwrap_or(100)
    }

    /// Flip one task between done and not done, returning the new progress
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when `day` or `task` is out of range
    pub fn toggle_task(&mut self, day: usize, task: usize) -> Result<u8> {
        let entry = self
            .structure
            .get_mut(day)
            .and_then(|d| d.tasks.get_mut(task))
            .ok_or_else(|| Error::InvalidInput(format!("no task {task} on day {day}")))?;
        entry.completed = !entry.completed;
        self.completion_percentage = self.progress();
        Ok(self.completion_percentage)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completion_percentage == 100
    }
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

/// Chapter to plan for
#[derive(Debug, Clone)]
pub struct StudyPlanRequest {
    pub subject: String,
    pub chapter: String,
    /// Grade if known, e.g. "8"
    pub grade: Option<String>,
    pub content: String,
}

impl StudyPlanRequest {
    fn user_prompt(&self) -> String {
        let content = self.content.trim();
        let content = match content.char_indices().nth(MAX_PLAN_CONTENT_CHARS) {
            Some((cut, _)) => {
                tracing::warn!(
                    chars = content.chars().count(),
                    "chapter content is long, using a truncated version"
                );
                format!("{}{TRUNCATION_NOTE}", &content[..cut])
            }
            None => content.to_string(),
        };
        format!(
            "Subject: {}\nChapter: {}\nGrade: {}\n\nChapter Content:\n---\n{content}\n---\n\n\
Generate the 3-day study plan in the specified JSON format based on the content above.",
            self.subject.trim(),
            self.chapter.trim(),
            self.grade.as_deref().unwrap_or("Unknown"),
        )
    }
}

/// Generates study plans
pub struct StudyPlanner {
    completion: Arc<dyn Completion>,
    keys: KeyStore,
}

impl StudyPlanner {
    pub fn new(completion: Arc<dyn Completion>, keys: KeyStore) -> Self {
        Self { completion, keys }
    }

    /// Generate a plan for one chapter
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` without a subject and chapter or with too little
    /// content, `MissingCredential` without a key, the completion error, or
    /// `MalformedResponse` when the answer is not a plan
    pub async fn generate(&self, request: &StudyPlanRequest) -> Result<StudyPlan> {
        if request.subject.trim().is_empty() || request.chapter.trim().is_empty() {
            return Err(Error::InvalidInput(
                "please select a book and chapter first".to_string(),
            ));
        }
        if request.content.trim().chars().count() < MIN_PLAN_CONTENT_CHARS {
            return Err(Error::InvalidInput(
                "chapter content is missing or too short".to_string(),
            ));
        }
        if self.keys.get().is_none() {
            return Err(Error::MissingCredential);
        }

        tracing::info!(
            subject = %request.subject,
            chapter = %request.chapter,
            content_chars = request.content.len(),
            "generating study plan"
        );

        let answer = self
            .completion
            .complete(
                PLAN_SYSTEM_PROMPT,
                &request.user_prompt(),
                CompletionOptions::new()
                    .max_tokens(PLAN_MAX_TOKENS)
                    .temperature(PLAN_TEMPERATURE),
            )
            .await?;

        StudyPlan::parse(&answer)
    }
}
