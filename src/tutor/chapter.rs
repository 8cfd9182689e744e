//! Chapter tutor: streamed answers grounded on chapter text

use std::sync::Arc;

use super::save_record;
use crate::credentials::KeyStore;
use crate::db::{ChatType, HistoryRepo, NewHistoryRecord};
use crate::openai::{ChunkCallback, Completion, CompletionOptions};
use crate::{Error, Result};

/// Shortest chapter text worth answering from
pub const MIN_CHAPTER_CHARS: usize = 50;

/// A question about one chapter
#[derive(Debug, Clone)]
pub struct ChapterQuestion {
    /// School class of the student, e.g. "6"
    pub class: String,
    pub chapter: String,
    pub content: String,
    pub question: String,
}

impl ChapterQuestion {
    fn system_prompt(&self) -> String {
        format!(
            "You are a helpful, educational assistant specializing in English literature for Class {} students. \
You will answer questions about the chapter \"{}\" based on the provided content. \
Be thorough but keep your explanations at an appropriate level for the student's grade. \
Always base your responses on the provided chapter content.",
            self.class, self.chapter
        )
    }

    fn user_prompt(&self) -> String {
        format!(
            "Chapter Content: {}\n\nQuestion: {}",
            self.content, self.question
        )
    }
}

/// Answers chapter questions
pub struct ChapterTutor {
    completion: Arc<dyn Completion>,
    keys: KeyStore,
    history: Option<HistoryRepo>,
}

impl ChapterTutor {
    pub fn new(completion: Arc<dyn Completion>, keys: KeyStore) -> Self {
        Self {
            completion,
            keys,
            history: None,
        }
    }

    /// Save answered questions
    #[must_use]
    pub fn with_history(mut self, history: HistoryRepo) -> Self {
        self.history = Some(history);
        self
    }

    /// Stream an answer through `on_chunk`, returning the full text
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank question or too little chapter text,
    /// `MissingCredential` without a key, or the completion error
    pub async fn ask(&self, request: &ChapterQuestion, on_chunk: ChunkCallback<'_>) -> Result<String> {
        if request.question.trim().is_empty() {
            return Err(Error::InvalidInput("please enter a question".to_string()));
        }
        if self.keys.get().is_none() {
            return Err(Error::MissingCredential);
        }
        if request.content.trim().chars().count() < MIN_CHAPTER_CHARS {
            return Err(Error::InvalidInput(
                "chapter content is missing or too short".to_string(),
            ));
        }

        tracing::info!(
            class = %request.class,
            chapter = %request.chapter,
            content_chars = request.content.len(),
            "answering chapter question"
        );

        let answer = self
            .completion
            .complete(
                &request.system_prompt(),
                &request.user_prompt(),
                CompletionOptions::new().streaming(on_chunk),
            )
            .await?;

        let record = NewHistoryRecord::new(ChatType::Teacher, request.question.trim())
            .with_response(answer.clone())
            .with_data(serde_json::json!({
                "class": request.class,
                "chapter": request.chapter,
            }));
        save_record(self.history.as_ref(), &record);

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use async_trait::async_trait;

    struct Streamer(Vec<&'static str>);

    #[async_trait]
    impl Completion for Streamer {
        async fn complete(
            &self,
            system_prompt: &str,
            user_prompt: &str,
            mut options: CompletionOptions<'_>,
        ) -> Result<String> {
            assert!(system_prompt.contains("Class 6"));
            assert!(user_prompt.ends_with("Question: Who is the hero?"));
            let on_chunk = options
                .take_chunk_callback()
                .ok_or_else(|| Error::InvalidInput("expected streaming".to_string()))?;
            for part in self.0.iter().copied() {
                on_chunk(part);
            }
            Ok(self.0.concat())
        }
    }

    fn question(content: &str, question: &str) -> ChapterQuestion {
        ChapterQuestion {
            class: "6".to_string(),
            chapter: "The Brave Girl".to_string(),
            content: content.to_string(),
            question: question.to_string(),
        }
    }

    const CHAPTER: &str = "Meena lived in a small village by the river. One day she saved a drowning calf.";

    #[tokio::test]
    async fn test_ask_streams_and_saves() {
        let db = init_memory().unwrap();
        let history = HistoryRepo::new(db);
        let tutor = ChapterTutor::new(
            Arc::new(Streamer(vec!["Meena ", "is the hero."])),
            KeyStore::in_memory(Some("sk-test-key-0123456789")),
        )
        .with_history(history.clone());

        let mut streamed = String::new();
        let mut sink = |chunk: &str| streamed.push_str(chunk);
        let answer = tutor
            .ask(&question(CHAPTER, "Who is the hero?"), &mut sink)
            .await
            .unwrap();

        assert_eq!(answer, "Meena is the hero.");
        assert_eq!(streamed, answer);

        let saved = history.list(Some(ChatType::Teacher), 10).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].ai_response.as_deref(), Some("Meena is the hero."));
    }

    #[tokio::test]
    async fn test_ask_validation() {
        let tutor = ChapterTutor::new(
            Arc::new(Streamer(vec![])),
            KeyStore::in_memory(Some("sk-test-key-0123456789")),
        );
        let mut sink = |_: &str| {};

        assert!(matches!(
            tutor.ask(&question(CHAPTER, "  "), &mut sink).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            tutor.ask(&question("too short", "Who?"), &mut sink).await,
            Err(Error::InvalidInput(_))
        ));

        let keyless = ChapterTutor::new(Arc::new(Streamer(vec![])), KeyStore::in_memory(None));
        assert!(matches!(
            keyless.ask(&question(CHAPTER, "Who?"), &mut sink).await,
            Err(Error::MissingCredential)
        ));
    }
}
