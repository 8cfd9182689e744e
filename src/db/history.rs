//! History repository for saved conversations

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

/// Which tool a history record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    StoryImages,
    SpokenEnglish,
    VoiceBot,
    SocraticTutor,
    Teacher,
}

impl ChatType {
    /// Stable string form stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StoryImages => "story-images",
            Self::SpokenEnglish => "spoken-english",
            Self::VoiceBot => "voice-bot",
            Self::SocraticTutor => "socratic-tutor",
            Self::Teacher => "teacher",
        }
    }

    /// Parse the stored string form
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "story-images" => Some(Self::StoryImages),
            "spoken-english" => Some(Self::SpokenEnglish),
            "voice-bot" => Some(Self::VoiceBot),
            "socratic-tutor" => Some(Self::SocraticTutor),
            "teacher" => Some(Self::Teacher),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record to be saved
#[derive(Debug, Clone)]
pub struct NewHistoryRecord {
    pub text: String,
    pub ai_response: Option<String>,
    pub chat_type: ChatType,
    pub image_url: Option<String>,
    pub tool_type: Option<String>,
    pub additional_data: Option<serde_json::Value>,
}

impl NewHistoryRecord {
    /// Record with only text and chat type set
    #[must_use]
    pub fn new(chat_type: ChatType, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ai_response: None,
            chat_type,
            image_url: None,
            tool_type: None,
            additional_data: None,
        }
    }

    /// Attach the assistant response
    #[must_use]
    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.ai_response = Some(response.into());
        self
    }

    /// Attach a generated image URL
    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Attach free-form JSON data
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.additional_data = Some(data);
        self
    }
}

/// A saved history record
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub id: String,
    pub text: String,
    pub ai_response: Option<String>,
    pub chat_type: ChatType,
    pub image_url: Option<String>,
    pub tool_type: Option<String>,
    pub additional_data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// History repository
#[derive(Clone)]
pub struct HistoryRepo {
    pool: DbPool,
}

impl HistoryRepo {
    /// Create a new history repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Save a record
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn save(&self, record: &NewHistoryRecord) -> Result<HistoryRecord> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let data = record
            .additional_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "INSERT INTO messages (id, text, ai_response, chat_type, image_url, tool_type, additional_data, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                id,
                record.text,
                record.ai_response,
                record.chat_type.as_str(),
                record.image_url,
                record.tool_type,
                data,
                now.timestamp(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(id = %id, chat_type = %record.chat_type, "history record saved");

        Ok(HistoryRecord {
            id,
            text: record.text.clone(),
            ai_response: record.ai_response.clone(),
            chat_type: record.chat_type,
            image_url: record.image_url.clone(),
            tool_type: record.tool_type.clone(),
            additional_data: record.additional_data.clone(),
            timestamp: now,
        })
    }

    /// List records, newest first, optionally filtered by chat type
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, chat_type: Option<ChatType>, limit: usize) -> Result<Vec<HistoryRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, text, ai_response, chat_type, image_url, tool_type, additional_data, timestamp
                 FROM messages
                 WHERE ?1 IS NULL OR chat_type = ?1
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(
                rusqlite::params![chat_type.map(ChatType::as_str), limit],
                |row| {
                    let chat_type: String = row.get(3)?;
                    let data: Option<String> = row.get(6)?;
                    let ts: i64 = row.get(7)?;
                    Ok(HistoryRecord {
                        id: row.get(0)?,
                        text: row.get(1)?,
                        ai_response: row.get(2)?,
                        chat_type: ChatType::parse(&chat_type).unwrap_or(ChatType::VoiceBot),
                        image_url: row.get(4)?,
                        tool_type: row.get(5)?,
                        additional_data: data.and_then(|d| serde_json::from_str(&d).ok()),
                        timestamp: DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now),
                    })
                },
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(records)
    }

    /// Delete records, optionally only one chat type
    ///
    /// Returns the number of deleted records
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn clear(&self, chat_type: Option<ChatType>) -> Result<usize> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let deleted = conn
            .execute(
                "DELETE FROM messages WHERE ?1 IS NULL OR chat_type = ?1",
                rusqlite::params![chat_type.map(ChatType::as_str)],
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(deleted, "history cleared");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> HistoryRepo {
        HistoryRepo::new(init_memory().unwrap())
    }

    #[test]
    fn test_save_and_list() {
        let repo = setup();
        repo.save(&NewHistoryRecord::new(ChatType::VoiceBot, "What is a verb?").with_response("An action word."))
            .unwrap();
        repo.save(&NewHistoryRecord::new(ChatType::Teacher, "Who wrote it?"))
            .unwrap();

        let all = repo.list(None, 10).unwrap();
        assert_eq!(all.len(), 2);

        let voice = repo.list(Some(ChatType::VoiceBot), 10).unwrap();
        assert_eq!(voice.len(), 1);
        assert_eq!(voice[0].text, "What is a verb?");
        assert_eq!(voice[0].ai_response.as_deref(), Some("An action word."));
    }

    #[test]
    fn test_list_newest_first_and_limit() {
        let repo = setup();
        for i in 0..3 {
            repo.save(&NewHistoryRecord::new(ChatType::VoiceBot, format!("q{i}")))
                .unwrap();
        }

        let recent = repo.list(None, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "q2");
        assert_eq!(recent[1].text, "q1");
    }

    #[test]
    fn test_additional_data_roundtrip() {
        let repo = setup();
        repo.save(
            &NewHistoryRecord::new(ChatType::StoryImages, "a story")
                .with_image_url("https://example.com/a.png")
                .with_data(serde_json::json!({"segments": 4})),
        )
        .unwrap();

        let records = repo.list(Some(ChatType::StoryImages), 1).unwrap();
        assert_eq!(records[0].image_url.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(records[0].additional_data, Some(serde_json::json!({"segments": 4})));
    }

    #[test]
    fn test_clear_by_type() {
        let repo = setup();
        repo.save(&NewHistoryRecord::new(ChatType::VoiceBot, "a")).unwrap();
        repo.save(&NewHistoryRecord::new(ChatType::Teacher, "b")).unwrap();

        assert_eq!(repo.clear(Some(ChatType::VoiceBot)).unwrap(), 1);
        let remaining = repo.list(None, 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].chat_type, ChatType::Teacher);
    }

    #[test]
    fn test_chat_type_parse() {
        for ct in [
            ChatType::StoryImages,
            ChatType::SpokenEnglish,
            ChatType::VoiceBot,
            ChatType::SocraticTutor,
            ChatType::Teacher,
        ] {
            assert_eq!(ChatType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ChatType::parse("unknown"), None);
    }
}
