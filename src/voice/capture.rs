//! Speech capture state machine
//!
//! Tracks one continuous listening session at a time. Recognised text is
//! appended to a live transcript that is handed over as the final transcript
//! only when the user ends the session. An engine that ends on its own is
//! reported as an unexpected stop and its transcript is dropped.
//!
//! Each session gets a number; engine events from an earlier session are
//! ignored.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::engine::{EngineErrorKind, EngineEvent, EngineSender, SessionEvent, SpeechEngine};
use crate::{Error, Result};

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
}

/// A capture failure surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl CaptureError {
    fn from_kind(kind: EngineErrorKind) -> Self {
        let message = match &kind {
            EngineErrorKind::NotAllowed => {
                "Microphone access denied. Please allow microphone permissions.".to_string()
            }
            EngineErrorKind::Network => {
                "Network error during speech recognition. Please check your connection."
                    .to_string()
            }
            EngineErrorKind::AudioCapture => {
                "Could not record from the microphone.".to_string()
            }
            EngineErrorKind::NoSpeech => "No speech detected.".to_string(),
            EngineErrorKind::Other(detail) => format!("Speech recognition error: {detail}"),
        };
        Self { kind, message }
    }
}

/// Notifications emitted by [`SpeechCapture`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The live transcript changed
    TranscriptChanged(String),
    /// A manually stopped session produced this transcript
    FinalTranscript(String),
    /// The engine ended the session without being asked to
    EndedUnexpectedly,
    /// Recognition failed and listening stopped
    Error(CaptureError),
}

/// Drives a [`SpeechEngine`] through Idle and Listening
pub struct SpeechCapture<E> {
    engine: E,
    state: CaptureState,
    transcript: String,
    manual_stop: bool,
    session: u64,
    events: UnboundedSender<CaptureEvent>,
    engine_tx: UnboundedSender<SessionEvent>,
}

impl<E: SpeechEngine> SpeechCapture<E> {
    /// Create a capture around `engine`
    ///
    /// Returns the receiver of engine events; feed each one to
    /// [`handle_engine_event`](Self::handle_engine_event).
    pub fn new(
        engine: E,
        events: UnboundedSender<CaptureEvent>,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let capture = Self {
            engine,
            state: CaptureState::Idle,
            transcript: String::new(),
            manual_stop: false,
            session: 0,
            events,
            engine_tx,
        };
        (capture, engine_rx)
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    /// Whether a session is active
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state == CaptureState::Listening
    }

    /// Live transcript of the current session
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Start listening
    ///
    /// Does nothing while already listening.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the engine is unavailable, or the engine's
    /// start error (state stays `Idle`)
    pub fn start(&mut self) -> Result<()> {
        if !self.engine.is_supported() {
            return Err(Error::Unsupported(
                "speech recognition is not available".to_string(),
            ));
        }
        if self.state == CaptureState::Listening {
            tracing::warn!("already listening, ignoring start");
            return Ok(());
        }

        self.transcript.clear();
        self.manual_stop = false;
        self.session += 1;
        self.emit(CaptureEvent::TranscriptChanged(String::new()));

        let sender = EngineSender::new(self.session, self.engine_tx.clone());
        if let Err(e) = self.engine.start(sender) {
            tracing::error!(error = %e, "failed to start speech recognition");
            self.state = CaptureState::Idle;
            return Err(e);
        }

        self.state = CaptureState::Listening;
        tracing::debug!(session = self.session, "listening");
        Ok(())
    }

    /// Stop listening and hand over the transcript once the engine ends
    ///
    /// Repeated calls while the engine is still finishing do nothing.
    pub fn stop(&mut self) {
        if self.state != CaptureState::Listening {
            tracing::debug!("not listening, ignoring stop");
            return;
        }
        if self.manual_stop {
            tracing::debug!("stop already requested");
            return;
        }

        self.manual_stop = true;
        if let Err(e) = self.engine.stop() {
            tracing::warn!(error = %e, "engine stop failed, finishing locally");
            self.finish_manual();
        }
    }

    /// Apply one event from the engine
    pub fn handle_engine_event(&mut self, event: SessionEvent) {
        if event.session != self.session {
            tracing::debug!(
                session = event.session,
                current = self.session,
                "dropping event from an old session"
            );
            return;
        }

        match event.event {
            EngineEvent::Result(text) => {
                if self.state != CaptureState::Listening {
                    tracing::debug!("dropping result outside a session");
                    return;
                }
                self.transcript.push_str(&text);
                self.emit(CaptureEvent::TranscriptChanged(self.transcript.clone()));
            }
            EngineEvent::Error(EngineErrorKind::NoSpeech) => {
                tracing::debug!("no speech detected, still listening");
            }
            EngineEvent::Error(kind) => {
                tracing::warn!(?kind, "speech recognition error");
                self.state = CaptureState::Idle;
                self.manual_stop = false;
                self.transcript.clear();
                self.engine.abort();
                self.emit(CaptureEvent::Error(CaptureError::from_kind(kind)));
            }
            EngineEvent::End => {
                if self.manual_stop {
                    self.finish_manual();
                } else if self.state == CaptureState::Listening {
                    tracing::warn!("listening stopped unexpectedly");
                    self.state = CaptureState::Idle;
                    self.transcript.clear();
                    self.engine.abort();
                    self.emit(CaptureEvent::EndedUnexpectedly);
                }
            }
        }
    }

    fn finish_manual(&mut self) {
        self.state = CaptureState::Idle;
        self.manual_stop = false;
        let transcript = std::mem::take(&mut self.transcript);
        if transcript.trim().is_empty() {
            tracing::debug!("session ended with empty transcript");
            return;
        }
        tracing::info!(chars = transcript.len(), "final transcript");
        self.emit(CaptureEvent::FinalTranscript(transcript));
    }

    fn emit(&self, event: CaptureEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("capture event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Behaves like the microphone engine: one session at a time
    #[derive(Default)]
    struct FakeEngine {
        unsupported: bool,
        fail_start: bool,
        fail_stop: bool,
        recording: bool,
        starts: usize,
        stops: usize,
        aborts: usize,
    }

    impl SpeechEngine for FakeEngine {
        fn is_supported(&self) -> bool {
            !self.unsupported
        }

        fn start(&mut self, _events: EngineSender) -> Result<()> {
            if self.fail_start {
                return Err(Error::PermissionDenied("microphone".to_string()));
            }
            if self.recording {
                return Err(Error::Recognition("already recording".to_string()));
            }
            self.recording = true;
            self.starts += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            self.stops += 1;
            if self.fail_stop {
                return Err(Error::Recognition("stop failed".to_string()));
            }
            if !self.recording {
                return Err(Error::Recognition("not recording".to_string()));
            }
            self.recording = false;
            Ok(())
        }

        fn abort(&mut self) {
            self.aborts += 1;
            self.recording = false;
        }
    }

    fn feed(capture: &mut SpeechCapture<FakeEngine>, event: EngineEvent) {
        let session = capture.session;
        capture.handle_engine_event(SessionEvent { session, event });
    }

    fn capture(engine: FakeEngine) -> (SpeechCapture<FakeEngine>, UnboundedReceiver<CaptureEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (capture, _engine_rx) = SpeechCapture::new(engine, tx);
        (capture, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<CaptureEvent>) -> Vec<CaptureEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn finals(events: &[CaptureEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                CaptureEvent::FinalTranscript(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_final_transcript_is_concatenation() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        for part in ["What ", "is ", "a verb?"] {
            feed(&mut capture, EngineEvent::Result(part.to_string()));
        }
        capture.stop();
        assert!(capture.is_listening());
        feed(&mut capture, EngineEvent::End);

        let events = drain(&mut rx);
        assert_eq!(events[0], CaptureEvent::TranscriptChanged(String::new()));
        assert_eq!(
            events[3],
            CaptureEvent::TranscriptChanged("What is a verb?".to_string())
        );
        assert_eq!(finals(&events), vec!["What is a verb?"]);
        assert_eq!(capture.state(), CaptureState::Idle);
        assert!(capture.transcript().is_empty());
    }

    #[test]
    fn test_unexpected_end_emits_no_final() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        feed(&mut capture, EngineEvent::Result("hello".to_string()));
        feed(&mut capture, EngineEvent::End);

        let events = drain(&mut rx);
        assert!(finals(&events).is_empty());
        assert_eq!(events.last(), Some(&CaptureEvent::EndedUnexpectedly));
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_no_speech_is_swallowed() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        feed(&mut capture, EngineEvent::Error(EngineErrorKind::NoSpeech));

        assert!(capture.is_listening());
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_fatal_error_returns_to_idle() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        feed(&mut capture, EngineEvent::Error(EngineErrorKind::Network));

        assert_eq!(capture.state(), CaptureState::Idle);
        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(CaptureEvent::Error(CaptureError { kind: EngineErrorKind::Network, .. }))
        ));
    }

    #[test]
    fn test_start_while_listening_is_noop() {
        let (mut capture, _rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        feed(&mut capture, EngineEvent::Result("keep".to_string()));
        capture.start().unwrap();

        assert_eq!(capture.engine.starts, 1);
        assert_eq!(capture.transcript(), "keep");
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.stop();
        assert_eq!(capture.engine.stops, 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_unsupported_engine() {
        let (mut capture, _rx) = capture(FakeEngine {
            unsupported: true,
            ..FakeEngine::default()
        });
        assert!(matches!(capture.start(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_start_failure_stays_idle() {
        let (mut capture, _rx) = capture(FakeEngine {
            fail_start: true,
            ..FakeEngine::default()
        });
        assert!(matches!(capture.start(), Err(Error::PermissionDenied(_))));
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_failed_stop_finishes_locally() {
        let (mut capture, mut rx) = capture(FakeEngine {
            fail_stop: true,
            ..FakeEngine::default()
        });
        capture.start().unwrap();
        feed(&mut capture, EngineEvent::Result("hi".to_string()));
        capture.stop();

        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(finals(&drain(&mut rx)), vec!["hi"]);
    }

    #[test]
    fn test_empty_manual_session_emits_no_final() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        capture.stop();
        feed(&mut capture, EngineEvent::End);
        assert!(finals(&drain(&mut rx)).is_empty());
    }

    #[test]
    fn test_repeated_stop_keeps_pending_turn() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        capture.stop();
        capture.stop();
        assert!(capture.is_listening());

        feed(&mut capture, EngineEvent::Result("What is a verb?".to_string()));
        feed(&mut capture, EngineEvent::End);

        assert_eq!(capture.engine.stops, 1);
        assert_eq!(finals(&drain(&mut rx)), vec!["What is a verb?"]);
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn test_restart_after_fatal_error() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        feed(&mut capture, EngineEvent::Error(EngineErrorKind::AudioCapture));

        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.engine.aborts, 1);
        assert!(!capture.engine.recording);

        capture.start().unwrap();
        assert!(capture.is_listening());
        assert_eq!(capture.engine.starts, 2);
        drain(&mut rx);

        feed(&mut capture, EngineEvent::Result("again".to_string()));
        capture.stop();
        feed(&mut capture, EngineEvent::End);
        assert_eq!(finals(&drain(&mut rx)), vec!["again"]);
    }

    #[test]
    fn test_events_from_old_session_are_ignored() {
        let (mut capture, mut rx) = capture(FakeEngine::default());
        capture.start().unwrap();
        let first = capture.session;
        feed(&mut capture, EngineEvent::Error(EngineErrorKind::Network));
        capture.start().unwrap();
        drain(&mut rx);

        capture.handle_engine_event(SessionEvent {
            session: first,
            event: EngineEvent::Result("stale".to_string()),
        });
        capture.handle_engine_event(SessionEvent {
            session: first,
            event: EngineEvent::End,
        });

        assert!(capture.is_listening());
        assert!(capture.transcript().is_empty());
        assert!(drain(&mut rx).is_empty());
    }
}
