//! Utterance endpointing for single-shot capture.
//!
//! Implements the "gap logic": an utterance is finalized once speech has been followed by
//! a silence threshold (800ms by default). Speech shorter than the minimum is discarded and
//! listening continues; very long speech is auto-committed.

use crate::error::{VoiceError, VoiceResult};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events emitted by the detector
#[derive(Debug, Clone)]
pub enum EndpointEvent {
    /// User started speaking
    SpeechStarted { timestamp: DateTime<Utc> },

    /// Speech shorter than the minimum was dropped
    SpeechDiscarded { duration: Duration },

    /// Utterance is finalized and ready for transcription
    UtteranceCommitted {
        timestamp: DateTime<Utc>,
        total_speech_duration: Duration,
        audio_samples: Vec<f32>,
    },
}

/// Configuration for utterance detection
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Silence duration before committing (default: 800ms)
    pub silence_threshold: Duration,

    /// Minimum speech duration to be considered an utterance (default: 200ms)
    pub min_speech_duration: Duration,

    /// Maximum utterance duration before auto-commit (default: 30s)
    pub max_utterance_duration: Duration,

    /// Sample rate for audio (default: 16000 Hz)
    pub sample_rate: u32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_millis(800),
            min_speech_duration: Duration::from_millis(200),
            max_utterance_duration: Duration::from_secs(30),
            sample_rate: 16000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Speaking,
    SilenceDetected,
}

/// Turns a stream of per-chunk VAD decisions into committed utterances
pub struct UtteranceDetector {
    config: EndpointConfig,
    state: State,
    speech_start: Option<Instant>,
    last_speech_time: Option<Instant>,
    audio_buffer: Vec<f32>,
    event_tx: mpsc::UnboundedSender<EndpointEvent>,
}

impl UtteranceDetector {
    pub fn new(config: EndpointConfig) -> (Self, mpsc::UnboundedReceiver<EndpointEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let detector = Self {
            config,
            state: State::Idle,
            speech_start: None,
            last_speech_time: None,
            audio_buffer: Vec::new(),
            event_tx,
        };
        (detector, event_rx)
    }

    /// Feed one VAD decision observed now.
    pub fn process(&mut self, is_speech: bool, audio_chunk: &[f32]) -> VoiceResult<()> {
        self.process_at(is_speech, audio_chunk, Instant::now())
    }

    /// Feed one VAD decision observed at `now`.
    pub fn process_at(
        &mut self,
        is_speech: bool,
        audio_chunk: &[f32],
        now: Instant,
    ) -> VoiceResult<()> {
        match (self.state, is_speech) {
            (State::Idle, true) => {
                debug!("🎤 Speech started");
                self.state = State::Speaking;
                self.speech_start = Some(now);
                self.last_speech_time = Some(now);
                self.audio_buffer.clear();
                self.audio_buffer.extend_from_slice(audio_chunk);
                self.emit(EndpointEvent::SpeechStarted {
                    timestamp: Utc::now(),
                })?;
            }

            (State::Speaking, true) => {
                self.last_speech_time = Some(now);
                self.audio_buffer.extend_from_slice(audio_chunk);
                if let Some(start) = self.speech_start {
                    if now.duration_since(start) >= self.config.max_utterance_duration {
                        warn!("⏱️ Max utterance duration reached, auto-committing");
                        return self.commit(now);
                    }
                }
            }

            (State::Speaking, false) => {
                self.state = State::SilenceDetected;
                // Trailing silence is kept so the transcriber hears the natural ending.
                self.audio_buffer.extend_from_slice(audio_chunk);
            }

            (State::SilenceDetected, true) => {
                debug!("🎤 Speech resumed");
                self.state = State::Speaking;
                self.last_speech_time = Some(now);
                self.audio_buffer.extend_from_slice(audio_chunk);
            }

            (State::SilenceDetected, false) => {
                self.audio_buffer.extend_from_slice(audio_chunk);
                if let Some(last_speech) = self.last_speech_time {
                    if now.duration_since(last_speech) >= self.config.silence_threshold {
                        return self.commit(now);
                    }
                }
            }

            (State::Idle, false) => {}
        }

        Ok(())
    }

    fn commit(&mut self, now: Instant) -> VoiceResult<()> {
        let duration = match (self.speech_start, self.last_speech_time) {
            (Some(start), Some(last)) => last.max(start).duration_since(start),
            (Some(start), None) => now.duration_since(start),
            _ => Duration::ZERO,
        };

        if duration < self.config.min_speech_duration {
            debug!("⏭️ Speech too short ({:?}), ignoring", duration);
            self.reset();
            return self.emit(EndpointEvent::SpeechDiscarded { duration });
        }

        info!(
            "🎯 Utterance committed: {:?} speech, {} samples",
            duration,
            self.audio_buffer.len()
        );
        let audio_samples = std::mem::take(&mut self.audio_buffer);
        self.reset();
        self.emit(EndpointEvent::UtteranceCommitted {
            timestamp: Utc::now(),
            total_speech_duration: duration,
            audio_samples,
        })
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.speech_start = None;
        self.last_speech_time = None;
        self.audio_buffer.clear();
    }

    fn emit(&self, event: EndpointEvent) -> VoiceResult<()> {
        self.event_tx
            .send(event)
            .map_err(|e| VoiceError::AudioStream(format!("endpoint channel closed: {}", e)))
    }

    /// Current state name (for logging/tests)
    pub fn state(&self) -> &'static str {
        match self.state {
            State::Idle => "idle",
            State::Speaking => "speaking",
            State::SilenceDetected => "silence_detected",
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}
