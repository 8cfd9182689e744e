//! Smaran - voice study assistant for children
//!
//! This library provides the core functionality behind the `smaran` CLI:
//! - Speech capture and voice turns (listen, answer, speak)
//! - Buffered and streamed chat completions
//! - Speech synthesis, image generation and story illustration
//! - Chapter Q&A, Socratic and spoken-English practice
//! - Grammar lessons with quizzes and chapter study plans
//! - A local conversation history
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      CLI                            │
//! │  voice │ ask │ tutor │ grammar │ plan │ history     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Voice                             │
//! │  SpeechCapture │ VoiceTurnCoordinator │ Playback    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        OpenAI clients  +  KeyStore  +  History      │
//! │   completions │ speech │ images │ transcription     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod openai;
pub mod tutor;
pub mod voice;

pub use config::Config;
pub use credentials::{Credential, KeyFormat, KeyStore};
pub use db::{DbConn, DbPool};
pub use error::{Error, ErrorKind, Result};
pub use tutor::{ChapterQuestion, ChapterTutor};
