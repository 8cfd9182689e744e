//! Local `SQLite` storage for the user-entered API key

use super::store::CredentialStore;
use crate::db::DbPool;
use crate::{Error, Result};

/// Row name of the OpenAI key
const OPENAI_KEY_NAME: &str = "openai_api_key";

/// Credential store backed by the local database
#[derive(Clone)]
pub struct SqliteCredentialStore {
    db: DbPool,
    name: String,
}

impl SqliteCredentialStore {
    /// Store for the OpenAI key
    #[must_use]
    pub fn new(db: DbPool) -> Self {
        Self::named(db, OPENAI_KEY_NAME)
    }

    /// Store under an explicit row name
    #[must_use]
    pub fn named(db: DbPool, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let conn = self
            .db
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let result = conn.query_row(
            "SELECT value FROM credentials WHERE name = ?1",
            rusqlite::params![self.name],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Database(e.to_string())),
        }
    }

    fn save(&self, value: &str) -> Result<()> {
        let conn = self
            .db
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO credentials (name, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![self.name, value],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self
            .db
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "DELETE FROM credentials WHERE name = ?1",
            rusqlite::params![self.name],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
