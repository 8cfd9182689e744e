//! Credential store with environment override

use std::sync::{Arc, Mutex};

use super::resolver::{Credential, KeyFormat, resolve_credential};
use crate::Result;

/// Environment variables consulted for the API key, in order
pub const ENV_KEY_VARS: [&str; 2] = ["OPENAI_API_KEY", "SMARAN_OPENAI_API_KEY"];

/// Source of an operator-provided credential
pub trait EnvSource: Send + Sync {
    /// Current environment value, if any
    fn lookup(&self) -> Option<String>;
}

/// Reads the real process environment on every lookup
#[derive(Debug, Clone, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn lookup(&self) -> Option<String> {
        ENV_KEY_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
    }
}

/// Fixed environment value (tests, embedding)
#[derive(Debug, Clone, Default)]
pub struct StaticEnv(pub Option<String>);

impl EnvSource for StaticEnv {
    fn lookup(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Persistent storage for a user-entered credential
pub trait CredentialStore: Send + Sync {
    /// Load the persisted value
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be read
    fn load(&self) -> Result<Option<String>>;

    /// Persist a value, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written
    fn save(&self, value: &str) -> Result<()>;

    /// Remove the persisted value
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written
    fn clear(&self) -> Result<()>;
}

/// In-memory credential store
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    value: Arc<Mutex<Option<String>>>,
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.value.lock().map(|v| v.clone()).unwrap_or_default())
    }

    fn save(&self, value: &str) -> Result<()> {
        if let Ok(mut v) = self.value.lock() {
            *v = Some(value.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let Ok(mut v) = self.value.lock() {
            *v = None;
        }
        Ok(())
    }
}

/// Where the active credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    Persisted,
}

/// Resolves the API credential: environment override > persisted value
///
/// Cheap to clone; clones share the same backing store.
#[derive(Clone)]
pub struct KeyStore {
    env: Arc<dyn EnvSource>,
    store: Arc<dyn CredentialStore>,
}

impl KeyStore {
    /// Create a key store from explicit sources
    pub fn new(env: impl EnvSource + 'static, store: impl CredentialStore + 'static) -> Self {
        Self {
            env: Arc::new(env),
            store: Arc::new(store),
        }
    }

    /// In-memory key store with a fixed environment value
    #[must_use]
    pub fn in_memory(env: Option<&str>) -> Self {
        Self::new(
            StaticEnv(env.map(ToString::to_string)),
            MemoryCredentialStore::default(),
        )
    }

    /// Current credential
    ///
    /// The environment is consulted on every call so an operator override
    /// takes effect without restarting.
    #[must_use]
    pub fn get(&self) -> Option<Credential> {
        let env = self.env.lookup();
        let persisted = self.load_persisted();
        resolve_credential(env.as_deref(), persisted.as_deref())
    }

    /// Current credential and where it came from
    #[must_use]
    pub fn get_with_source(&self) -> Option<(Credential, CredentialSource)> {
        if let Some(key) = resolve_credential(self.env.lookup().as_deref(), None) {
            return Some((key, CredentialSource::Environment));
        }
        resolve_credential(None, self.load_persisted().as_deref())
            .map(|key| (key, CredentialSource::Persisted))
    }

    /// Persist a user-entered credential
    ///
    /// Likely-invalid keys are stored anyway; the returned format lets the
    /// caller warn the user.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written
    pub fn set(&self, value: &str) -> Result<KeyFormat> {
        let value = value.trim();
        self.store.save(value)?;

        let format = KeyFormat::of(value);
        if format.looks_valid() {
            tracing::info!(?format, "api key saved");
        } else {
            tracing::warn!("api key saved but does not look like an OpenAI key");
        }

        if self.env.lookup().is_some() {
            tracing::info!("environment api key is set and takes precedence over the saved key");
        }

        Ok(format)
    }

    /// Remove the persisted credential
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    fn load_persisted(&self) -> Option<String> {
        match self.store.load() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read saved api key");
                None
            }
        }
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let keys = KeyStore::in_memory(None);
        assert!(keys.get().is_none());

        let format = keys.set("sk-abcdefghijklmnopqrstuvwxyz").unwrap();
        assert_eq!(format, KeyFormat::Standard);
        assert_eq!(keys.get().unwrap().expose(), "sk-abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn test_env_wins_over_set() {
        let keys = KeyStore::in_memory(Some("sk-from-environment-000000"));
        keys.set("sk-user-entered-0000000000").unwrap();

        let (key, source) = keys.get_with_source().unwrap();
        assert_eq!(key.expose(), "sk-from-environment-000000");
        assert_eq!(source, CredentialSource::Environment);
    }

    #[test]
    fn test_likely_invalid_still_stored() {
        let keys = KeyStore::in_memory(None);
        let format = keys.set("not-a-key").unwrap();
        assert_eq!(format, KeyFormat::LikelyInvalid);
        assert_eq!(keys.get().unwrap().expose(), "not-a-key");
    }

    #[test]
    fn test_clear() {
        let keys = KeyStore::in_memory(None);
        keys.set("sk-abcdefghijklmnopqrstuvwxyz").unwrap();
        keys.clear().unwrap();
        assert!(keys.get().is_none());
    }
}
