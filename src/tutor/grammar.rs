//! Grammar lessons with a multiple-choice quiz
//!
//! The model is asked for a lesson as JSON. Output that cannot be used is
//! replaced by a simple placeholder lesson, and a quiz with the wrong number
//! of questions is padded or trimmed to the requested count.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::credentials::KeyStore;
use crate::openai::{Completion, CompletionOptions, Payload, parse_structured};
use crate::{Error, Result};

/// Most quiz questions per lesson
pub const MAX_QUESTIONS: usize = 10;

const LESSON_MAX_TOKENS: u32 = 3000;
const LESSON_TEMPERATURE: f32 = 0.7;

/// Student level, which picks the grade band and suggested topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrammarLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl GrammarLevel {
    #[must_use]
    pub const fn grades(self) -> &'static str {
        match self {
            Self::Beginner => "grades 1-2",
            Self::Intermediate => "grades 3-5",
            Self::Advanced => "grades 6-8",
        }
    }

    /// Suggested lesson topics
    #[must_use]
    pub const fn topics(self) -> &'static [&'static str] {
        match self {
            Self::Beginner => &[
                "Nouns and Pronouns",
                "Simple Present Tense",
                "Articles (a, an, the)",
                "Plural Nouns",
                "Common Adjectives",
                "Subject-Verb Agreement",
            ],
            Self::Intermediate => &[
                "Present Continuous Tense",
                "Past Simple Tense",
                "Prepositions of Time and Place",
                "Comparative and Superlative Adjectives",
                "Adverbs of Frequency",
                "Modal Verbs (can, must)",
            ],
            Self::Advanced => &[
                "Present Perfect Tense",
                "Past Continuous Tense",
                "Future Tenses",
                "Conditional Sentences",
                "Passive Voice",
                "Reported Speech",
            ],
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

/// Quiz difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Key used in the lesson's `quiz` object
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Capitalized form shown as the lesson level
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

/// One multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanations: Vec<String>,
}

impl QuizQuestion {
    fn placeholder(number: usize, topic: &str) -> Self {
        Self {
            question: format!("Practice question {number} about {topic}"),
            options: ["Option A", "Option B", "Option C", "Option D"]
                .map(String::from)
                .to_vec(),
            correct_index: 0,
            explanations: [
                "This is correct",
                "This is incorrect",
                "This is incorrect",
                "This is incorrect",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// How the quiz questions came about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonOrigin {
    /// Exactly as generated
    Generated,
    /// Placeholder questions were appended
    Padded { added: usize },
    /// Extra questions were dropped
    Trimmed { dropped: usize },
    /// The answer was unusable; the whole lesson is a placeholder
    Fallback,
}

/// What to teach
#[derive(Debug, Clone)]
pub struct LessonRequest {
    pub topic: String,
    pub level: GrammarLevel,
    pub difficulty: Difficulty,
    /// Clamped to `1..=MAX_QUESTIONS`
    pub question_count: usize,
}

impl LessonRequest {
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.question_count.clamp(1, MAX_QUESTIONS)
    }

    fn system_prompt(&self) -> String {
        let difficulty = self.difficulty.as_str();
        let label = self.difficulty.label();
        let count = self.question_count();
        format!(
            r#"You are an expert English teacher for elementary school students. Create an engaging English grammar lesson about "{topic}" for {grades}. The lesson difficulty should be "{label}".

Your response must follow this exact JSON format without any markdown formatting or extra text:
{{
  "title": "Lesson title",
  "content": "A clear, simple explanation of the grammar concept (keep it concise)",
  "level": "{label}",
  "examples": ["Example 1", "Example 2", "Example 3"],
  "quiz": {{
    "{difficulty}": [
      {{
        "question": "Question text",
        "options": ["Option A", "Option B", "Option C", "Option D"],
        "correctIndex": 0,
        "explanations": ["Explanation for A", "Explanation for B", "Explanation for C", "Explanation for D"]
      }}
    ]
  }}
}}

Important instructions:
1. Generate EXACTLY {count} quiz questions for the "{difficulty}" difficulty.
2. Keep the explanation and content brief and simple.
3. Return only in strict JSON format with no extra text, markdown, or code blocks.
4. Make sure all JSON is properly formatted and closed."#,
            topic = self.topic.trim(),
            grades = self.level.grades(),
        )
    }
}

/// Result of a submitted quiz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    /// Rounded to the nearest whole percent
    pub percentage: u8,
}

impl QuizScore {
    /// Encouragement matching the score
    #[must_use]
    pub fn feedback(&self) -> String {
        let p = self.percentage;
        if p >= 80 {
            format!("Great job! You scored {p}%")
        } else if p >= 60 {
            format!("Good effort! You scored {p}%")
        } else {
            format!("You scored {p}%. Let's review the lesson and try again!")
        }
    }
}

/// A lesson ready to study
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarLesson {
    pub title: String,
    pub content: String,
    pub level: String,
    pub examples: Vec<String>,
    pub difficulty: Difficulty,
    pub questions: Vec<QuizQuestion>,
    pub origin: LessonOrigin,
}

#[derive(Deserialize)]
struct LessonBody {
    title: String,
    content: String,
    level: Option<String>,
    examples: Vec<String>,
    quiz: HashMap<String, Vec<QuizQuestion>>,
}

impl GrammarLesson {
    /// Placeholder lesson used when the model's answer is unusable
    #[must_use]
    pub fn fallback(request: &LessonRequest) -> Self {
        let topic = request.topic.trim();
        Self {
            title: format!("Lesson about {topic}"),
            content: format!("This is a basic lesson about {topic}. Let's learn together!"),
            level: request.difficulty.label().to_string(),
            examples: ["Example 1", "Example 2", "Example 3"]
                .map(String::from)
                .to_vec(),
            difficulty: request.difficulty,
            questions: (1..=request.question_count())
                .map(|n| QuizQuestion::placeholder(n, topic))
                .collect(),
            origin: LessonOrigin::Fallback,
        }
    }

    /// Build a lesson from model output, never failing
    #[must_use]
    pub fn from_model_output(text: &str, request: &LessonRequest) -> Self {
        let Some(body) = parse_body(text, request.difficulty) else {
            tracing::warn!(topic = %request.topic, "unusable lesson answer, using fallback");
            return Self::fallback(request);
        };

        let wanted = request.question_count();
        let mut quiz = body.quiz;
        let mut questions = quiz.remove(request.difficulty.as_str()).unwrap_or_default();
        let received = questions.len();

        let origin = if received < wanted {
            tracing::warn!(received, wanted, "too few quiz questions, padding");
            questions.extend(
                (received + 1..=wanted).map(|n| QuizQuestion::placeholder(n, request.topic.trim())),
            );
            LessonOrigin::Padded {
                added: wanted - received,
            }
        } else if received > wanted {
            questions.truncate(wanted);
            LessonOrigin::Trimmed {
                dropped: received - wanted,
            }
        } else {
            LessonOrigin::Generated
        };

        Self {
            title: body.title,
            content: body.content,
            level: body
                .level
                .unwrap_or_else(|| request.difficulty.label().to_string()),
            examples: body.examples,
            difficulty: request.difficulty,
            questions,
            origin,
        }
    }

    /// Score answers given as option indices, one per question
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` unless every question has an answer
    pub fn score(&self, answers: &[Option<usize>]) -> Result<QuizScore> {
        if answers.len() != self.questions.len() || answers.iter().any(Option::is_none) {
            return Err(Error::InvalidInput(
                "please answer all questions before submitting".to_string(),
            ));
        }

        let total = self.questions.len();
        let correct = self
            .questions
            .iter()
            .zip(answers)
            .filter(|(q, a)| **a == Some(q.correct_index))
            .count();
        let percentage = if total == 0 {
            0
        } else {
            u8::try_from((correct * 200 + total) / (2 * total)).unwrap_or(100)
        };

        Ok(QuizScore {
            correct,
            total,
            percentage,
        })
    }
}

/// Parse the lesson JSON, requiring every field the quiz needs
fn parse_body(text: &str, difficulty: Difficulty) -> Option<LessonBody> {
    let Payload::Structured(value) = parse_structured(text) else {
        return None;
    };
    let body: LessonBody = match serde_json::from_value(value) {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "lesson json has the wrong shape");
            return None;
        }
    };

    let complete = !body.title.trim().is_empty()
        && !body.content.trim().is_empty()
        && body.quiz.contains_key(difficulty.as_str());
    complete.then_some(body)
}

/// Generates grammar lessons
pub struct GrammarTutor {
    completion: Arc<dyn Completion>,
    keys: KeyStore,
}

impl GrammarTutor {
    pub fn new(completion: Arc<dyn Completion>, keys: KeyStore) -> Self {
        Self { completion, keys }
    }

    /// Generate a lesson for `request`
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank topic, `MissingCredential` without a
    /// key, or the completion error. Unusable answers are not errors; they
    /// produce a fallback lesson.
    pub async fn generate(&self, request: &LessonRequest) -> Result<GrammarLesson> {
        if request.topic.trim().is_empty() {
            return Err(Error::InvalidInput("please choose a topic".to_string()));
        }
        if self.keys.get().is_none() {
            return Err(Error::MissingCredential);
        }

        tracing::info!(
            topic = %request.topic,
            difficulty = request.difficulty.as_str(),
            questions = request.question_count(),
            "generating grammar lesson"
        );

        let answer = self
            .completion
            .complete(
                &request.system_prompt(),
                "Generate a grammar lesson",
                CompletionOptions::new()
                    .max_tokens(LESSON_MAX_TOKENS)
                    .temperature(LESSON_TEMPERATURE),
            )
            .await?;

        Ok(GrammarLesson::from_model_output(&answer, request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    fn request(count: usize) -> LessonRequest {
        LessonRequest {
            topic: "Plural Nouns".to_string(),
            level: GrammarLevel::Beginner,
            difficulty: Difficulty::Medium,
            question_count: count,
        }
    }

    fn question(n: usize) -> serde_json::Value {
        json!({
            "question": format!("Q{n}"),
            "options": ["cat", "cats", "caties", "catz"],
            "correctIndex": 1,
        })
    }

    fn lesson_json(questions: usize) -> String {
        json!({
            "title": "Plurals",
            "content": "Add -s to most nouns.",
            "level": "Medium",
            "examples": ["cat -> cats"],
            "quiz": {"medium": (1..=questions).map(question).collect::<Vec<_>>()},
        })
        .to_string()
    }

    #[test]
    fn test_exact_lesson() {
        let lesson = GrammarLesson::from_model_output(&lesson_json(3), &request(3));
        assert_eq!(lesson.origin, LessonOrigin::Generated);
        assert_eq!(lesson.title, "Plurals");
        assert_eq!(lesson.questions.len(), 3);
        assert!(lesson.questions[0].explanations.is_empty());
    }

    #[test]
    fn test_short_quiz_padded() {
        let lesson = GrammarLesson::from_model_output(&lesson_json(2), &request(5));
        assert_eq!(lesson.origin, LessonOrigin::Padded { added: 3 });
        assert_eq!(lesson.questions.len(), 5);
        assert_eq!(
            lesson.questions[2].question,
            "Practice question 3 about Plural Nouns"
        );
    }

    #[test]
    fn test_long_quiz_trimmed() {
        let lesson = GrammarLesson::from_model_output(&lesson_json(6), &request(4));
        assert_eq!(lesson.origin, LessonOrigin::Trimmed { dropped: 2 });
        assert_eq!(lesson.questions.len(), 4);
    }

    #[test]
    fn test_unusable_answers_fall_back() {
        let missing_difficulty = json!({
            "title": "Plurals",
            "content": "x",
            "examples": [],
            "quiz": {"easy": [question(1)]},
        })
        .to_string();

        for text in ["Sorry, I can't do that.", "{\"title\": \"cut off", missing_difficulty.as_str()] {
            let lesson = GrammarLesson::from_model_output(text, &request(2));
            assert_eq!(lesson.origin, LessonOrigin::Fallback);
            assert_eq!(lesson.title, "Lesson about Plural Nouns");
            assert_eq!(lesson.level, "Medium");
            assert_eq!(lesson.questions.len(), 2);
        }
    }

    #[test]
    fn test_fenced_lesson_accepted() {
        let text = format!("```json\n{}\n```", lesson_json(1));
        let lesson = GrammarLesson::from_model_output(&text, &request(1));
        assert_eq!(lesson.origin, LessonOrigin::Generated);
    }

    #[test]
    fn test_question_count_clamped() {
        assert_eq!(request(0).question_count(), 1);
        assert_eq!(request(25).question_count(), MAX_QUESTIONS);
        assert_eq!(GrammarLesson::fallback(&request(0)).questions.len(), 1);
    }

    #[test]
    fn test_scoring() {
        let lesson = GrammarLesson::from_model_output(&lesson_json(3), &request(3));

        let score = lesson.score(&[Some(1), Some(1), Some(0)]).unwrap();
        assert_eq!((score.correct, score.total, score.percentage), (2, 3, 67));
        assert_eq!(score.feedback(), "Good effort! You scored 67%");

        let perfect = lesson.score(&[Some(1), Some(1), Some(1)]).unwrap();
        assert!(perfect.feedback().starts_with("Great job!"));

        assert!(matches!(
            lesson.score(&[Some(1), None, Some(1)]),
            Err(Error::InvalidInput(_))
        ));
        assert!(lesson.score(&[Some(1)]).is_err());
    }

    #[test]
    fn test_level_topics() {
        assert_eq!(GrammarLevel::Advanced.grades(), "grades 6-8");
        assert!(GrammarLevel::Beginner.topics().contains(&"Plural Nouns"));
        assert_eq!(GrammarLevel::parse(" Intermediate "), Some(GrammarLevel::Intermediate));
        assert_eq!(Difficulty::parse("HARD"), Some(Difficulty::Hard));
    }

    struct Fixed(String);

    #[async_trait]
    impl Completion for Fixed {
        async fn complete(
            &self,
            system_prompt: &str,
            _user_prompt: &str,
            options: CompletionOptions<'_>,
        ) -> Result<String> {
            assert!(system_prompt.contains("EXACTLY 2 quiz questions"));
            assert!(system_prompt.contains("\"medium\""));
            assert_eq!(options.max_tokens, Some(LESSON_MAX_TOKENS));
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_generate() {
        let tutor = GrammarTutor::new(
            Arc::new(Fixed(lesson_json(2))),
            KeyStore::in_memory(Some("sk-test-key-0123456789")),
        );
        let lesson = tutor.generate(&request(2)).await.unwrap();
        assert_eq!(lesson.origin, LessonOrigin::Generated);

        let blank = LessonRequest {
            topic: "  ".to_string(),
            ..request(2)
        };
        assert!(matches!(tutor.generate(&blank).await, Err(Error::InvalidInput(_))));
    }
}
