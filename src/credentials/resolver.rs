//! Credential type, format heuristic and precedence rule

use secrecy::{ExposeSecret, SecretString};

/// Prefix of project-scoped keys, which need the beta header
const PROJECT_PREFIX: &str = "sk-proj-";

/// Prefix shared by all API keys
const KEY_PREFIX: &str = "sk-";

/// Shortest key that is plausibly real
const MIN_KEY_LEN: usize = 20;

/// Bearer token for the remote API
pub struct Credential(SecretString);

impl Credential {
    /// Wrap a raw key
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Access the raw key for header construction
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Classify the key by prefix and length
    #[must_use]
    pub fn format(&self) -> KeyFormat {
        KeyFormat::of(self.expose())
    }

    /// Whether requests made with this key need the beta header
    ///
    /// Decided by prefix alone, whatever the length.
    #[must_use]
    pub fn is_project_key(&self) -> bool {
        self.expose().trim().starts_with(PROJECT_PREFIX)
    }

    /// Masked form safe for display (e.g. `sk-p…3f9a`)
    #[must_use]
    pub fn masked(&self) -> String {
        let key = self.expose();
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}…{tail}")
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

/// Format classification of a key
///
/// Only a heuristic: the remote API is the real validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// `sk-proj-…`
    Project,
    /// `sk-…`
    Standard,
    /// Doesn't look like an API key
    LikelyInvalid,
}

impl KeyFormat {
    /// Classify a raw key
    #[must_use]
    pub fn of(key: &str) -> Self {
        let key = key.trim();
        if key.len() < MIN_KEY_LEN {
            Self::LikelyInvalid
        } else if key.starts_with(PROJECT_PREFIX) {
            Self::Project
        } else if key.starts_with(KEY_PREFIX) {
            Self::Standard
        } else {
            Self::LikelyInvalid
        }
    }

    /// Whether the key looks usable
    #[must_use]
    pub const fn looks_valid(self) -> bool {
        !matches!(self, Self::LikelyInvalid)
    }
}

/// Resolve the active credential
///
/// Priority: environment value > persisted value. Blank values count as absent.
#[must_use]
pub fn resolve_credential(env: Option<&str>, persisted: Option<&str>) -> Option<Credential> {
    let non_blank = |v: &&str| !v.trim().is_empty();
    env.filter(non_blank)
        .or_else(|| persisted.filter(non_blank))
        .map(|v| Credential::new(v.trim()))
}
