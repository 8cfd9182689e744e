//! Configuration management for Smaran

pub mod file;

use std::path::PathBuf;

use crate::openai::{ImageQuality, ImageSize};
use crate::{Error, Result};

use file::SmaranConfigFile;

/// Default OpenAI-compatible API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Smaran configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database)
    pub data_dir: PathBuf,

    /// Remote API configuration
    pub api: ApiConfig,

    /// Completion defaults
    pub llm: LlmConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Image generation configuration
    pub image: ImageConfig,
}

/// Remote API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
}

/// Completion defaults
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat model identifier
    pub model: String,

    /// Default completion length cap
    pub max_tokens: u32,

    /// Default sampling temperature
    pub temperature: f32,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Transcription model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Recognition language hint
    pub language: String,
}

/// Image generation configuration
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Image model identifier
    pub model: String,

    /// Default output size
    pub size: ImageSize,

    /// Default output quality
    pub quality: ImageQuality,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api: ApiConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            llm: LlmConfig {
                model: "gpt-4o-mini".to_string(),
                max_tokens: 1500,
                temperature: 0.7,
            },
            voice: VoiceConfig {
                stt_model: "whisper-1".to_string(),
                tts_model: "tts-1".to_string(),
                tts_voice: "nova".to_string(),
                tts_speed: 1.0,
                language: "en".to_string(),
            },
            image: ImageConfig {
                model: "dall-e-3".to_string(),
                size: ImageSize::Square,
                quality: ImageQuality::Standard,
            },
        }
    }
}

/// Default data directory: `~/.local/share/smaran` on Linux
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("smaran"))
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::from_sources(fc, |name| std::env::var(name).ok())?;

        if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
            tracing::warn!(
                path = %config.data_dir.display(),
                error = %e,
                "failed to create data directory"
            );
        }

        Ok(config)
    }

    /// Layer a config file and an environment lookup over the defaults
    ///
    /// # Errors
    ///
    /// Returns error if a numeric or enumerated value cannot be parsed
    pub fn from_sources<F>(fc: SmaranConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = env("SMARAN_API_BASE")
            .or(fc.api.base_url)
            .unwrap_or(defaults.api.base_url)
            .trim_end_matches('/')
            .to_string();

        let llm = LlmConfig {
            model: env("SMARAN_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(defaults.llm.model),
            max_tokens: parse_env(&env, "SMARAN_MAX_TOKENS")?
                .or(fc.llm.max_tokens)
                .unwrap_or(defaults.llm.max_tokens),
            temperature: parse_env(&env, "SMARAN_TEMPERATURE")?
                .or(fc.llm.temperature)
                .unwrap_or(defaults.llm.temperature),
        };

        let voice = VoiceConfig {
            stt_model: env("SMARAN_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.voice.stt_model),
            tts_model: env("SMARAN_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.voice.tts_model),
            tts_voice: env("SMARAN_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(defaults.voice.tts_voice),
            tts_speed: parse_env(&env, "SMARAN_TTS_SPEED")?
                .or(fc.voice.tts_speed)
                .unwrap_or(defaults.voice.tts_speed),
            language: env("SMARAN_LANGUAGE")
                .or(fc.voice.language)
                .unwrap_or(defaults.voice.language),
        };

        if !(0.25..=4.0).contains(&voice.tts_speed) {
            return Err(Error::Config(format!(
                "tts speed must be between 0.25 and 4.0, got {}",
                voice.tts_speed
            )));
        }

        let size = match env("SMARAN_IMAGE_SIZE").or(fc.image.size) {
            Some(s) => ImageSize::parse(&s)
                .ok_or_else(|| Error::Config(format!("unknown image size: {s}")))?,
            None => defaults.image.size,
        };
        let quality = match env("SMARAN_IMAGE_QUALITY").or(fc.image.quality) {
            Some(q) => ImageQuality::parse(&q)
                .ok_or_else(|| Error::Config(format!("unknown image quality: {q}")))?,
            None => defaults.image.quality,
        };
        let image = ImageConfig {
            model: env("SMARAN_IMAGE_MODEL")
                .or(fc.image.model)
                .unwrap_or(defaults.image.model),
            size,
            quality,
        };

        let data_dir = env("SMARAN_DATA_DIR")
            .or(fc.storage.data_dir)
            .map_or(defaults.data_dir, PathBuf::from);

        Ok(Self {
            data_dir,
            api: ApiConfig { base_url },
            llm,
            voice,
            image,
        })
    }

    /// Path of the `SQLite` database file
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("smaran.db")
    }
}

/// Read and parse an env var, treating absence as `None`
fn parse_env<T, F>(env: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    env(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for {name}: {raw}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(SmaranConfigFile::default(), |_| None).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 1500);
        assert_eq!(config.voice.tts_voice, "nova");
        assert_eq!(config.image.size, ImageSize::Square);
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = file::parse_config(
            r#"
            [llm]
            model = "from-file"
            max_tokens = 200
            "#,
        )
        .unwrap();
        let env = env_from(&[("SMARAN_LLM_MODEL", "from-env")]);

        let config = Config::from_sources(fc, env).unwrap();
        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.llm.max_tokens, 200);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let env = env_from(&[("SMARAN_API_BASE", "http://localhost:8080/v1/")]);
        let config = Config::from_sources(SmaranConfigFile::default(), env).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let env = env_from(&[("SMARAN_MAX_TOKENS", "lots")]);
        assert!(Config::from_sources(SmaranConfigFile::default(), env).is_err());

        let env = env_from(&[("SMARAN_TTS_SPEED", "9")]);
        assert!(Config::from_sources(SmaranConfigFile::default(), env).is_err());

        let env = env_from(&[("SMARAN_IMAGE_SIZE", "tiny")]);
        assert!(Config::from_sources(SmaranConfigFile::default(), env).is_err());
    }
}
