//! Error types for Smaran

use thiserror::Error;

/// Result type alias for Smaran operations
pub type Result<T> = std::result::Result<T, Error>;

/// Category of a non-2xx response from the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCategory {
    /// 401: bad or revoked credential
    Unauthorized,
    /// 429: too many requests or quota exhausted
    RateLimited,
    /// 503: service temporarily down
    ServiceUnavailable,
    /// Any other status
    Other,
}

impl RemoteCategory {
    /// Classify an HTTP status code
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            429 => Self::RateLimited,
            503 => Self::ServiceUnavailable,
            _ => Self::Other,
        }
    }

    /// Human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unauthorized => "authentication error",
            Self::RateLimited => "rate limit exceeded",
            Self::ServiceUnavailable => "service unavailable",
            Self::Other => "API error",
        }
    }
}

impl std::fmt::Display for RemoteCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse error taxonomy used to decide how a failure is shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Platform lacks a required capability
    Unsupported,
    /// Microphone access refused
    PermissionDenied,
    /// Bad or missing credential
    RemoteAuth,
    /// Remote API throttled the request
    RemoteRateLimited,
    /// Remote API temporarily unavailable
    RemoteUnavailable,
    /// Any other remote failure
    Remote,
    /// Unparseable or incomplete response
    MalformedResponse,
    /// Local failure (storage, audio device, configuration)
    Internal,
}

/// Errors that can occur in Smaran
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Required capability is not available on this platform
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Microphone or device access refused
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No API credential configured
    #[error("API key not set")]
    MissingCredential,

    /// Non-2xx response from the remote API
    #[error("{category} ({status}): {body}")]
    Remote {
        status: u16,
        category: RemoteCategory,
        body: String,
    },

    /// Response could not be parsed into the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Speech recognition error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// A voice turn is already being processed
    #[error("a voice turn is already in flight")]
    TurnInFlight,

    /// Input rejected before any request was made
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Build a remote error from a status code and response body
    #[must_use]
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            status,
            category: RemoteCategory::from_status(status),
            body: body.into(),
        }
    }

    /// Map this error onto the user-facing taxonomy
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Self::MissingCredential => ErrorKind::RemoteAuth,
            Self::Remote { category, .. } => match category {
                RemoteCategory::Unauthorized => ErrorKind::RemoteAuth,
                RemoteCategory::RateLimited => ErrorKind::RemoteRateLimited,
                RemoteCategory::ServiceUnavailable => ErrorKind::RemoteUnavailable,
                RemoteCategory::Other => ErrorKind::Remote,
            },
            Self::Http(_) => ErrorKind::Remote,
            Self::MalformedResponse(_) | Self::Serialization(_) => ErrorKind::MalformedResponse,
            _ => ErrorKind::Internal,
        }
    }

    /// Short message suitable for a transient notification
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Unsupported => {
                "Speech recognition is not supported on this device.".to_string()
            }
            ErrorKind::PermissionDenied => {
                "Microphone access denied. Please allow microphone permissions.".to_string()
            }
            ErrorKind::RemoteAuth => {
                "OpenAI API key missing or invalid. Please set your key again.".to_string()
            }
            ErrorKind::RemoteRateLimited => {
                "OpenAI rate limit exceeded. Please try again later.".to_string()
            }
            ErrorKind::RemoteUnavailable => {
                "OpenAI service unavailable. Please try again later.".to_string()
            }
            ErrorKind::Remote | ErrorKind::MalformedResponse | ErrorKind::Internal => {
                self.to_string()
            }
        }
    }
}
