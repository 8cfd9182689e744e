//! Single-prompt practice chats

use std::sync::Arc;

use super::save_record;
use crate::credentials::KeyStore;
use crate::db::{ChatType, HistoryRepo, NewHistoryRecord};
use crate::openai::{Completion, CompletionOptions};
use crate::{Error, Result};

const PRACTICE_TEMPERATURE: f32 = 0.7;

const SOCRATIC_PROMPT: &str = "You are a Socratic tutor for English language students in grades 1-8. \
Your goal is to help students learn by guiding them to discover answers themselves.

Guidelines:
1. NEVER give direct answers to questions. Instead, ask follow-up questions that lead students to discover insights.
2. Use age-appropriate language based on the complexity of their questions.
3. Break complex topics into smaller, manageable questions.
4. Praise effort and good thinking.
5. If they're stuck, provide small hints but still let them figure out the main point.
6. Relate concepts to examples they would understand.
7. Keep your responses concise and engaging.
8. Use friendly, encouraging language.

Remember: The goal is to develop their critical thinking skills while teaching English.";

const SPOKEN_ENGLISH_PROMPT: &str = "You are an English conversation practice assistant. \
Respond to the user in a way that helps them practice their English speaking skills. \
Provide constructive feedback on grammar or pronunciation if appropriate, \
but keep the conversation flowing naturally.";

/// What kind of practice the chat runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeMode {
    /// Guides with questions instead of answers
    Socratic,
    /// Conversation practice with light corrections
    SpokenEnglish,
}

impl PracticeMode {
    /// System prompt sent with every message
    #[must_use]
    pub const fn system_prompt(self) -> &'static str {
        match self {
            Self::Socratic => SOCRATIC_PROMPT,
            Self::SpokenEnglish => SPOKEN_ENGLISH_PROMPT,
        }
    }

    /// History category for saved exchanges
    #[must_use]
    pub const fn chat_type(self) -> ChatType {
        match self {
            Self::Socratic => ChatType::SocraticTutor,
            Self::SpokenEnglish => ChatType::SpokenEnglish,
        }
    }
}

/// One answered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub message: String,
    pub reply: String,
}

/// A practice conversation
///
/// Each message is answered on its own; earlier exchanges are kept for
/// display and are not sent back to the model.
pub struct PracticeChat {
    mode: PracticeMode,
    completion: Arc<dyn Completion>,
    keys: KeyStore,
    history: Option<HistoryRepo>,
    exchanges: Vec<Exchange>,
}

impl PracticeChat {
    pub fn new(mode: PracticeMode, completion: Arc<dyn Completion>, keys: KeyStore) -> Self {
        Self {
            mode,
            completion,
            keys,
            history: None,
            exchanges: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: HistoryRepo) -> Self {
        self.history = Some(history);
        self
    }

    #[must_use]
    pub const fn mode(&self) -> PracticeMode {
        self.mode
    }

    /// Exchanges so far, oldest first
    #[must_use]
    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Forget the conversation
    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    /// Answer one message
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank message, `MissingCredential` without
    /// a key, or the completion error (the conversation is left unchanged)
    pub async fn reply(&mut self, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("please enter a question".to_string()));
        }
        if self.keys.get().is_none() {
            return Err(Error::MissingCredential);
        }

        tracing::info!(mode = ?self.mode, chars = message.len(), "practice message");

        let reply = self
            .completion
            .complete(
                self.mode.system_prompt(),
                message,
                CompletionOptions::new().temperature(PRACTICE_TEMPERATURE),
            )
            .await?;

        let record = NewHistoryRecord::new(self.mode.chat_type(), message).with_response(reply.clone());
        save_record(self.history.as_ref(), &record);

        self.exchanges.push(Exchange {
            message: message.to_string(),
            reply: reply.clone(),
        });
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<(String, String, Option<f32>)>>,
        fail: bool,
    }

    #[async_trait]
    impl Completion for Echo {
        async fn complete(
            &self,
            system_prompt: &str,
            user_prompt: &str,
            options: CompletionOptions<'_>,
        ) -> Result<String> {
            self.seen.lock().unwrap().push((
                system_prompt.to_string(),
                user_prompt.to_string(),
                options.temperature,
            ));
            if self.fail {
                return Err(Error::remote(503, "down"));
            }
            Ok(format!("What do you think about {user_prompt}?"))
        }
    }

    fn keys() -> KeyStore {
        KeyStore::in_memory(Some("sk-test-key-0123456789"))
    }

    #[tokio::test]
    async fn test_socratic_reply_saved() {
        let echo = Arc::new(Echo::default());
        let history = HistoryRepo::new(init_memory().unwrap());
        let mut chat = PracticeChat::new(PracticeMode::Socratic, echo.clone(), keys())
            .with_history(history.clone());

        let reply = chat.reply("  nouns  ").await.unwrap();
        assert_eq!(reply, "What do you think about nouns?");
        assert_eq!(chat.exchanges().len(), 1);
        assert_eq!(chat.exchanges()[0].message, "nouns");

        let seen = echo.seen.lock().unwrap();
        assert!(seen[0].0.contains("Socratic tutor"));
        assert_eq!(seen[0].1, "nouns");
        assert!(seen[0].2.is_some_and(|t| (t - 0.7).abs() < f32::EPSILON));

        let saved = history.list(Some(ChatType::SocraticTutor), 10).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].ai_response.as_deref(), Some(reply.as_str()));
    }

    #[tokio::test]
    async fn test_spoken_english_uses_its_category() {
        let history = HistoryRepo::new(init_memory().unwrap());
        let mut chat = PracticeChat::new(
            PracticeMode::SpokenEnglish,
            Arc::new(Echo::default()),
            keys(),
        )
        .with_history(history.clone());

        chat.reply("I goed to school").await.unwrap();
        assert_eq!(history.list(Some(ChatType::SpokenEnglish), 10).unwrap().len(), 1);
        assert!(history.list(Some(ChatType::SocraticTutor), 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_leave_conversation_unchanged() {
        let mut chat = PracticeChat::new(
            PracticeMode::Socratic,
            Arc::new(Echo {
                fail: true,
                ..Echo::default()
            }),
            keys(),
        );
        assert!(matches!(chat.reply("why?").await, Err(Error::Remote { .. })));
        assert!(matches!(chat.reply("   ").await, Err(Error::InvalidInput(_))));
        assert!(chat.exchanges().is_empty());

        let mut keyless = PracticeChat::new(
            PracticeMode::SpokenEnglish,
            Arc::new(Echo::default()),
            KeyStore::in_memory(None),
        );
        assert!(matches!(keyless.reply("hello").await, Err(Error::MissingCredential)));
    }
}
