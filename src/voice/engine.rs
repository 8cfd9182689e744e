//! Speech recognition engine seam

use tokio::sync::mpsc::UnboundedSender;

use crate::Result;

/// Failure reported by a recognition engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Silence while listening; transient noise
    NoSpeech,
    /// Microphone access refused
    NotAllowed,
    /// Recognition backend unreachable
    Network,
    /// Device failure while recording
    AudioCapture,
    /// Anything else
    Other(String),
}

/// Events an engine delivers while a session is active
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A recognised piece of speech
    Result(String),
    /// A recognition failure
    Error(EngineErrorKind),
    /// The session ended, requested or not
    End,
}

/// An engine event tagged with the session that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: u64,
    pub event: EngineEvent,
}

/// Delivers events for one recognition session
#[derive(Debug, Clone)]
pub struct EngineSender {
    session: u64,
    tx: UnboundedSender<SessionEvent>,
}

impl EngineSender {
    #[must_use]
    pub const fn new(session: u64, tx: UnboundedSender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    /// Session these events belong to
    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }

    /// Send an event; returns false once the receiver is gone
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx
            .send(SessionEvent {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// A continuous speech recognizer
///
/// Events from a session are delivered on the sender passed to `start`.
/// Every stopped session ends with exactly one `End` event; an aborted one
/// may deliver nothing further.
pub trait SpeechEngine: Send {
    /// Whether recognition is available on this machine
    fn is_supported(&self) -> bool;

    /// Begin a recognition session
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` when microphone access is refused, or another
    /// error if the session cannot start
    fn start(&mut self, events: EngineSender) -> Result<()>;

    /// Ask the engine to end the current session
    ///
    /// # Errors
    ///
    /// Returns error if the stop request cannot be issued
    fn stop(&mut self) -> Result<()>;

    /// Tear down the current session without waiting for its result
    ///
    /// Idempotent; does nothing when no session is active.
    fn abort(&mut self);
}
