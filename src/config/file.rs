//! TOML configuration file loading
//!
//! Supports `~/.config/smaran/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SmaranConfigFile {
    /// Remote API configuration
    #[serde(default)]
    pub api: ApiFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Image generation configuration
    #[serde(default)]
    pub image: ImageFileConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageFileConfig,
}

/// Remote API configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    /// Base URL of the OpenAI-compatible API (e.g. "https://api.openai.com/v1")
    pub base_url: Option<String>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// Default completion length cap
    pub max_tokens: Option<u32>,

    /// Default sampling temperature
    pub temperature: Option<f32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "nova")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Recognition language hint (e.g. "en")
    pub language: Option<String>,
}

/// Image generation configuration
#[derive(Debug, Default, Deserialize)]
pub struct ImageFileConfig {
    /// Image model (e.g. "dall-e-3")
    pub model: Option<String>,

    /// Output size ("1024x1024", "1024x1792", "1792x1024")
    pub size: Option<String>,

    /// Output quality ("standard" or "hd")
    pub quality: Option<String>,
}

/// Storage configuration
#[derive(Debug, Default, Deserialize)]
pub struct StorageFileConfig {
    /// Override for the data directory
    pub data_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SmaranConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SmaranConfigFile {
    let Some(path) = config_file_path() else {
        return SmaranConfigFile::default();
    };

    if !path.exists() {
        return SmaranConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => parse_config(&content).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            SmaranConfigFile::default()
        }),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SmaranConfigFile::default()
        }
    }
}

/// Parse config file content
///
/// # Errors
///
/// Returns error if the content is not valid TOML for the schema
pub fn parse_config(content: &str) -> crate::Result<SmaranConfigFile> {
    let config = toml::from_str(content)?;
    tracing::info!("loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/smaran/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("smaran").join("config.toml"))
}
