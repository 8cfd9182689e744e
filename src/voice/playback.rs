//! Audio playback
//!
//! One sink, at most one active playback. Starting a new source always stops
//! and rewinds the current one first.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use super::coordinator::{ChatMessage, Role};
use crate::{Error, Result};

/// Synthesized speech attached to an assistant message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    pub id: Uuid,
    data: Arc<[u8]>,
}

impl AudioHandle {
    /// Wrap MP3 bytes
    #[must_use]
    pub fn new(mp3: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data: mp3.into(),
        }
    }

    /// Encoded audio
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Playback notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started(Uuid),
    Stopped(Uuid),
    Failed { id: Uuid, message: String },
}

/// Result of a replay request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Replayed(Uuid),
    NothingToReplay,
}

/// Output device abstraction
pub trait AudioSink: Send {
    /// Load `handle` from the start and begin playing it
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be decoded or the device fails
    fn load_and_play(&mut self, handle: &AudioHandle) -> Result<()>;

    /// Stop and rewind; idempotent
    fn stop(&mut self);

    /// Whether audio is currently audible
    fn is_playing(&self) -> bool;
}

/// Owns the sink and enforces single playback
pub struct PlaybackController<S> {
    sink: S,
    current: Option<Uuid>,
    events: UnboundedSender<PlaybackEvent>,
}

impl<S: AudioSink> PlaybackController<S> {
    pub const fn new(sink: S, events: UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            sink,
            current: None,
            events,
        }
    }

    /// Play `handle`, stopping whatever is playing
    ///
    /// # Errors
    ///
    /// Returns the sink error after emitting `Failed`
    pub fn play(&mut self, handle: &AudioHandle) -> Result<()> {
        self.stop();

        if let Err(e) = self.sink.load_and_play(handle) {
            tracing::warn!(id = %handle.id, error = %e, "playback failed");
            self.emit(PlaybackEvent::Failed {
                id: handle.id,
                message: e.to_string(),
            });
            return Err(e);
        }

        tracing::debug!(id = %handle.id, "playback started");
        self.current = Some(handle.id);
        self.emit(PlaybackEvent::Started(handle.id));
        Ok(())
    }

    /// Stop and rewind the current playback, if any
    pub fn stop(&mut self) {
        let Some(id) = self.current.take() else {
            return;
        };
        if self.sink.is_playing() {
            self.sink.stop();
            tracing::debug!(%id, "playback stopped");
            self.emit(PlaybackEvent::Stopped(id));
        }
    }

    /// Replay the newest assistant message that has audio
    ///
    /// # Errors
    ///
    /// Returns the sink error if playback fails
    pub fn replay_last(&mut self, messages: &[ChatMessage]) -> Result<ReplayOutcome> {
        let Some(handle) = messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.audio.as_ref())
        else {
            tracing::debug!("nothing to replay");
            return Ok(ReplayOutcome::NothingToReplay);
        };

        let handle = handle.clone();
        self.play(&handle)?;
        Ok(ReplayOutcome::Replayed(handle.id))
    }

    /// Whether audio is audible
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.current.is_some() && self.sink.is_playing()
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }
}

struct ActivePlayback {
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Speaker output through cpal
///
/// Each playback runs on its own thread holding the device stream, so it can
/// be interrupted from the caller's thread.
#[derive(Default)]
pub struct SpeakerSink {
    active: Option<ActivePlayback>,
}

impl SpeakerSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Play raw mono samples
    ///
    /// # Errors
    ///
    /// Returns error if no output device can be opened
    pub fn play_pcm(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        self.stop();
        if samples.is_empty() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        let worker = {
            let stop = Arc::clone(&stop);
            let finished = Arc::clone(&finished);
            std::thread::spawn(move || {
                play_blocking(samples, sample_rate, &stop, &finished, &ready_tx);
                finished.store(true, Ordering::Release);
            })
        };

        ready_rx
            .recv()
            .map_err(|_| Error::Audio("playback thread exited during startup".to_string()))??;

        self.active = Some(ActivePlayback {
            stop,
            finished,
            worker,
        });
        Ok(())
    }

    /// Block until the current playback ends
    pub fn wait(&mut self) {
        if let Some(active) = self.active.take()
            && active.worker.join().is_err()
        {
            tracing::error!("playback thread panicked");
        }
    }
}

impl AudioSink for SpeakerSink {
    fn load_and_play(&mut self, handle: &AudioHandle) -> Result<()> {
        let (samples, sample_rate) = decode_mp3(handle.bytes())?;
        self.play_pcm(samples, sample_rate)
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop.store(true, Ordering::Release);
            if active.worker.join().is_err() {
                tracing::error!("playback thread panicked");
            }
        }
    }

    fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.finished.load(Ordering::Acquire))
    }
}

impl Drop for SpeakerSink {
    fn drop(&mut self) {
        AudioSink::stop(self);
    }
}

fn play_blocking(
    samples: Vec<f32>,
    sample_rate: u32,
    stop: &AtomicBool,
    finished: &Arc<AtomicBool>,
    ready: &std::sync::mpsc::Sender<Result<()>>,
) {
    let stream = match open_output(samples.len(), sample_rate, samples, Arc::clone(finished)) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while !stop.load(Ordering::Acquire) && !finished.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(20));
    }
    drop(stream);
}

fn open_output(
    sample_count: usize,
    sample_rate: u32,
    samples: Vec<f32>,
    finished: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let rate = SampleRate(sample_rate);
    let supported = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        })
    };
    let config: StreamConfig = supported(1)
        .or_else(|| supported(2))
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?
        .with_sample_rate(rate)
        .config();
    let channels = usize::from(config.channels);

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        channels,
        samples = sample_count,
        "audio playback initialized"
    );

    let mut position = 0usize;
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = samples.get(position).copied().unwrap_or(0.0);
                    frame.fill(sample);
                    if position < samples.len() {
                        position += 1;
                    } else {
                        finished.store(true, Ordering::Release);
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(stream)
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate).unwrap_or(sample_rate);
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("no MP3 frames found".to_string()));
    }
    Ok((samples, sample_rate))
}
