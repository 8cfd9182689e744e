//! Microphone recording and the Whisper-backed recognition engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::engine::{EngineErrorKind, EngineEvent, EngineSender, SpeechEngine};
use crate::openai::TranscriptionClient;
use crate::{Error, Result};

/// Preferred capture rate (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Records the default input device on a dedicated thread
///
/// cpal streams can't cross threads, so the stream lives and dies on the
/// worker and only the sample buffer is shared.
pub struct Recorder {
    buffer: Arc<Mutex<Vec<f32>>>,
    stop: Arc<AtomicBool>,
    sample_rate: u32,
    worker: Option<JoinHandle<()>>,
}

impl Recorder {
    /// Open the default input device and start recording
    ///
    /// `on_error` is called from the audio thread for device failures.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if access is refused, or `Audio` if no
    /// usable device exists
    pub fn start(on_error: impl Fn(String) + Send + 'static) -> Result<Self> {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<u32>>();

        let worker = {
            let buffer = Arc::clone(&buffer);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let stream = match open_input(buffer, on_error) {
                    Ok((stream, rate)) => {
                        let _ = ready_tx.send(Ok(rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(20));
                }
                drop(stream);
                tracing::debug!("audio capture stopped");
            })
        };

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| Error::Audio("audio thread exited during startup".to_string()))??;

        Ok(Self {
            buffer,
            stop,
            sample_rate,
            worker: Some(worker),
        })
    }

    /// Rate of the recorded samples
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples recorded so far, without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Discard recorded samples
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Stop recording and return everything captured
    #[must_use]
    pub fn finish(mut self) -> Vec<f32> {
        self.halt();
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("audio capture thread panicked");
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.halt();
    }
}

fn open_input(
    buffer: Arc<Mutex<Vec<f32>>>,
    on_error: impl Fn(String) + Send + 'static,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let config: StreamConfig = match device
        .supported_input_configs()
        .map_err(device_error)?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        }) {
        Some(supported) => supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config(),
        None => device.default_input_config().map_err(device_error)?.config(),
    };
    let channels = usize::from(config.channels.max(1));

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = config.sample_rate.0,
        channels,
        "audio capture initialized"
    );

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    if channels == 1 {
                        buf.extend_from_slice(data);
                    } else {
                        #[allow(clippy::cast_precision_loss)]
                        buf.extend(
                            data.chunks(channels)
                                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                        );
                    }
                }
            },
            move |err| {
                tracing::error!(error = %err, "audio capture error");
                on_error(err.to_string());
            },
            None,
        )
        .map_err(device_error)?;

    stream.play().map_err(device_error)?;
    tracing::debug!("audio capture started");
    Ok((stream, config.sample_rate.0))
}

fn device_error(e: impl std::fmt::Display) -> Error {
    let message = e.to_string();
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") {
        Error::PermissionDenied(message)
    } else {
        Error::Audio(message)
    }
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Root mean square energy of a block of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Recognition engine that records until stopped, then transcribes the
/// whole utterance in one request
pub struct MicrophoneEngine {
    transcriber: TranscriptionClient,
    recording: Option<(Recorder, EngineSender)>,
}

impl MicrophoneEngine {
    #[must_use]
    pub const fn new(transcriber: TranscriptionClient) -> Self {
        Self {
            transcriber,
            recording: None,
        }
    }
}

impl SpeechEngine for MicrophoneEngine {
    fn is_supported(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn start(&mut self, events: EngineSender) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::Recognition("already recording".to_string()));
        }

        let device_events = events.clone();
        let recorder = Recorder::start(move |_| {
            device_events.send(EngineEvent::Error(EngineErrorKind::AudioCapture));
        })?;
        tracing::debug!(session = events.session(), "recording started");
        self.recording = Some((recorder, events));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let (recorder, events) = self
            .recording
            .take()
            .ok_or_else(|| Error::Recognition("not recording".to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Recognition(e.to_string()))?;

        let sample_rate = recorder.sample_rate();
        let transcriber = self.transcriber.clone();

        runtime.spawn(async move {
            let samples = match tokio::task::spawn_blocking(move || recorder.finish()).await {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::error!(error = %e, "recorder join failed");
                    events.send(EngineEvent::Error(EngineErrorKind::AudioCapture));
                    events.send(EngineEvent::End);
                    return;
                }
            };

            if let Some(event) = transcribe(&transcriber, &samples, sample_rate).await {
                events.send(event);
            }
            events.send(EngineEvent::End);
        });

        Ok(())
    }

    fn abort(&mut self) {
        if let Some((recorder, events)) = self.recording.take() {
            tracing::debug!(session = events.session(), "recording aborted");
            drop(recorder);
        }
    }
}

async fn transcribe(
    transcriber: &TranscriptionClient,
    samples: &[f32],
    sample_rate: u32,
) -> Option<EngineEvent> {
    if samples.is_empty() {
        return Some(EngineEvent::Error(EngineErrorKind::NoSpeech));
    }

    let wav = match samples_to_wav(samples, sample_rate) {
        Ok(wav) => wav,
        Err(e) => {
            tracing::error!(error = %e, "wav encoding failed");
            return Some(EngineEvent::Error(EngineErrorKind::AudioCapture));
        }
    };

    match transcriber.transcribe(wav).await {
        Ok(text) if text.is_empty() => Some(EngineEvent::Error(EngineErrorKind::NoSpeech)),
        Ok(text) => Some(EngineEvent::Result(text)),
        Err(Error::Http(e)) => {
            tracing::error!(error = %e, "transcription transport failed");
            Some(EngineEvent::Error(EngineErrorKind::Network))
        }
        Err(e) => Some(EngineEvent::Error(EngineErrorKind::Other(e.user_message()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_to_wav_header() {
        let wav = samples_to_wav(&[0.0, 0.5, -0.5, 1.0], SAMPLE_RATE).unwrap();
        assert_eq!(&wav[..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44 byte header + 4 samples * 2 bytes
        assert_eq!(wav.len(), 52);

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
    }

    #[test]
    fn test_rms() {
        assert!(rms(&[]).abs() < f32::EPSILON);
        assert!((rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_device_error_classification() {
        assert!(matches!(
            device_error("Permission denied by the system"),
            Error::PermissionDenied(_)
        ));
        assert!(matches!(device_error("device busy"), Error::Audio(_)));
    }

    #[test]
    fn test_abort_without_session_is_noop() {
        let api = crate::openai::ApiClient::new(
            "http://127.0.0.1:9/v1",
            crate::KeyStore::in_memory(None),
        );
        let mut engine = MicrophoneEngine::new(TranscriptionClient::new(api, "whisper-1", "en"));
        engine.abort();
        engine.abort();
        assert!(engine.recording.is_none());
        assert!(matches!(engine.stop(), Err(Error::Recognition(_))));
    }
}
