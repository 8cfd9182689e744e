//! Voice turn coordination
//!
//! Each final transcript becomes one turn: a single completion round trip,
//! optional history persistence, then best-effort speech synthesis and
//! playback. Only one turn is processed at a time; [`TurnGate`] is shared
//! with the capture side so listening can't restart mid-turn.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::playback::{AudioHandle, AudioSink, PlaybackController, ReplayOutcome};
use crate::db::{ChatType, HistoryRepo, NewHistoryRecord};
use crate::error::ErrorKind;
use crate::openai::{Completion, CompletionOptions, SpeechSynthesizer};
use crate::{Error, Result};

/// System prompt for spoken conversations
pub const VOICE_SYSTEM_PROMPT: &str = "You are a friendly and helpful AI assistant for students. \
Keep your responses clear, accurate, and conversational. Limit your responses to 2-3 paragraphs \
at most, unless the student asks for more detailed information.";

/// Assistant text recorded when the completion fails
pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// Voice used for spoken replies
pub const REPLY_VOICE: &str = "nova";

const VOICE_TEMPERATURE: f32 = 0.7;
const VOICE_MAX_TOKENS: u32 = 300;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub audio: Option<AudioHandle>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            audio: None,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn with_audio(mut self, audio: AudioHandle) -> Self {
        self.audio = Some(audio);
        self
    }
}

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient user-visible notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Updates published while turns are processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A message was appended to the conversation
    Message(ChatMessage),
    /// Speech was attached to an assistant message
    AudioAttached { message_id: Uuid, audio_id: Uuid },
    Notice(Notice),
    /// Replay was requested but no message has audio
    NothingToReplay,
    /// The gate was released; capture may start again
    Idle,
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank transcript, nothing done
    Ignored,
    /// The assistant answered; `spoken` tells whether audio was attached
    Answered { spoken: bool },
    /// The completion failed and the fallback reply was recorded
    Failed(ErrorKind),
}

/// Single-flight flag shared between capture and coordinator
#[derive(Debug, Clone, Default)]
pub struct TurnGate(Arc<AtomicBool>);

impl TurnGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate
    ///
    /// # Errors
    ///
    /// Returns `TurnInFlight` if a turn already holds it
    pub fn try_acquire(&self) -> Result<TurnGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::TurnInFlight)?;
        Ok(TurnGuard(Arc::clone(&self.0)))
    }

    /// Whether a turn is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the gate on drop
#[derive(Debug)]
pub struct TurnGuard(Arc<AtomicBool>);

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Requests accepted by [`VoiceTurnCoordinator::run`]
#[derive(Debug)]
pub enum TurnCommand {
    /// Process a final transcript under an already claimed gate
    Transcript { text: String, guard: TurnGuard },
    /// Replay the newest spoken reply
    Replay,
    /// Silence the current reply
    StopAudio,
}

/// Turns final transcripts into assistant replies
pub struct VoiceTurnCoordinator<S> {
    completion: Arc<dyn Completion>,
    speech: Arc<dyn SpeechSynthesizer>,
    playback: PlaybackController<S>,
    history: Option<HistoryRepo>,
    messages: Vec<ChatMessage>,
    gate: TurnGate,
    events: UnboundedSender<TurnEvent>,
}

impl<S: AudioSink> VoiceTurnCoordinator<S> {
    pub fn new(
        completion: Arc<dyn Completion>,
        speech: Arc<dyn SpeechSynthesizer>,
        playback: PlaybackController<S>,
        events: UnboundedSender<TurnEvent>,
    ) -> Self {
        Self {
            completion,
            speech,
            playback,
            history: None,
            messages: Vec::new(),
            gate: TurnGate::new(),
            events,
        }
    }

    /// Persist answered turns
    #[must_use]
    pub fn with_history(mut self, history: HistoryRepo) -> Self {
        self.history = Some(history);
        self
    }

    /// Gate shared with the capture side
    #[must_use]
    pub const fn gate(&self) -> &TurnGate {
        &self.gate
    }

    /// Conversation so far
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Whether a reply is audible
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.playback.is_speaking()
    }

    /// Process one final transcript
    ///
    /// # Errors
    ///
    /// Returns `TurnInFlight` if another turn holds the gate. Remote and
    /// synthesis failures are reported as notices, not errors.
    pub async fn handle_final_transcript(&mut self, text: &str) -> Result<TurnOutcome> {
        let guard = self.gate.try_acquire()?;
        let outcome = self.run_turn(text).await;
        drop(guard);
        Ok(outcome)
    }

    /// Replay the newest spoken reply
    ///
    /// # Errors
    ///
    /// Returns error if the audio device fails
    pub fn replay_last(&mut self) -> Result<ReplayOutcome> {
        self.playback.replay_last(&self.messages)
    }

    /// Stop any reply being played
    pub fn stop_audio(&mut self) {
        self.playback.stop();
    }

    /// Serve commands until the sender side closes
    pub async fn run(mut self, mut commands: UnboundedReceiver<TurnCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                TurnCommand::Transcript { text, guard } => {
                    self.run_turn(&text).await;
                    drop(guard);
                    self.emit(TurnEvent::Idle);
                }
                TurnCommand::Replay => match self.replay_last() {
                    Ok(ReplayOutcome::NothingToReplay) => self.emit(TurnEvent::NothingToReplay),
                    Ok(ReplayOutcome::Replayed(_)) => {}
                    Err(e) => self.notify(Notice::warning(format!("Could not play audio: {e}"))),
                },
                TurnCommand::StopAudio => self.stop_audio(),
            }
        }
        self.playback.stop();
        tracing::debug!("turn coordinator stopped");
    }

    async fn run_turn(&mut self, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("ignoring empty transcript");
            return TurnOutcome::Ignored;
        }

        self.push(ChatMessage::user(text));
        tracing::info!(chars = text.len(), "processing voice turn");

        let options = CompletionOptions::new()
            .temperature(VOICE_TEMPERATURE)
            .max_tokens(VOICE_MAX_TOKENS);
        let reply = match self
            .completion
            .complete(VOICE_SYSTEM_PROMPT, text, options)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "voice turn completion failed");
                self.push(ChatMessage::assistant(FALLBACK_REPLY));
                self.notify(Notice::error(e.user_message()));
                return TurnOutcome::Failed(e.kind());
            }
        };

        let message_id = self.push(ChatMessage::assistant(reply.clone()));
        self.save_history(text, &reply);

        let audio = match self.speech.synthesize(&reply).await {
            Ok(mp3) => AudioHandle::new(mp3),
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis failed");
                self.notify(Notice::warning(
                    "Could not generate speech. Showing text response only.",
                ));
                return TurnOutcome::Answered { spoken: false };
            }
        };

        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.audio = Some(audio.clone());
        }
        self.emit(TurnEvent::AudioAttached {
            message_id,
            audio_id: audio.id,
        });

        if let Err(e) = self.playback.play(&audio) {
            self.notify(Notice::warning(format!("Could not play audio: {e}")));
        }
        TurnOutcome::Answered { spoken: true }
    }

    fn save_history(&self, text: &str, reply: &str) {
        let Some(history) = &self.history else {
            return;
        };
        let record = NewHistoryRecord::new(ChatType::VoiceBot, text).with_response(reply);
        if let Err(e) = history.save(&record) {
            tracing::warn!(error = %e, "failed to save voice turn");
        }
    }

    fn push(&mut self, message: ChatMessage) -> Uuid {
        let id = message.id;
        self.emit(TurnEvent::Message(message.clone()));
        self.messages.push(message);
        id
    }

    fn notify(&self, notice: Notice) {
        self.emit(TurnEvent::Notice(notice));
    }

    fn emit(&self, event: TurnEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_single_flight() {
        let gate = TurnGate::new();
        let guard = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(gate.clone().try_acquire(), Err(Error::TurnInFlight)));

        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_ok());
    }

    #[test]
    fn test_with_audio() {
        let audio = AudioHandle::new(vec![0xff]);
        let message = ChatMessage::assistant("hi").with_audio(audio.clone());
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.audio, Some(audio));
    }
}
