//! Voice processing module
//!
//! Handles speech capture, turn coordination and playback.
//! Recognition runs through a [`SpeechEngine`]; the shipped engine records
//! the microphone and transcribes each utterance when listening stops.

mod capture;
mod coordinator;
mod engine;
mod microphone;
mod playback;

pub use capture::{CaptureError, CaptureEvent, CaptureState, SpeechCapture};
pub use coordinator::{
    ChatMessage, FALLBACK_REPLY, Notice, NoticeLevel, REPLY_VOICE, Role, TurnCommand, TurnEvent,
    TurnGate, TurnGuard, TurnOutcome, VOICE_SYSTEM_PROMPT, VoiceTurnCoordinator,
};
pub use engine::{EngineErrorKind, EngineEvent, EngineSender, SessionEvent, SpeechEngine};
pub use microphone::{MicrophoneEngine, Recorder, SAMPLE_RATE, rms, samples_to_wav};
pub use playback::{
    AudioHandle, AudioSink, PlaybackController, PlaybackEvent, ReplayOutcome, SpeakerSink,
    decode_mp3,
};
