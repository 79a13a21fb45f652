//! **Microphone recognizer**: One utterance from the default input device, then STT.
//!
//! Each `recognize()` opens the microphone on a dedicated thread (cpal `Stream` and the VAD are
//! `!Send`), runs WebRTC VAD on 30ms chunks and feeds the [`UtteranceDetector`]. The first
//! committed utterance is handed to the [`SttBackend`]. Dropping the future (stop_listening)
//! raises a stop flag; the thread drops the stream and the device is released.

use crate::adapter::SpeechRecognizer;
use crate::audio::{AudioCapture, AudioChunk, AudioConfig};
use crate::endpoint::{EndpointConfig, EndpointEvent, UtteranceDetector};
use crate::error::{VoiceError, VoiceResult};
use crate::stt::{PcmUtterance, SttBackend};
use crate::vad::{VadConfig, VadDetector};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Configuration for microphone capture.
#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    /// Sample rate (default 16000). Must be one WebRTC VAD supports.
    pub sample_rate: u32,
    /// VAD aggressiveness 0-3 (default 2).
    pub vad_mode: u8,
    /// Silence after speech that ends the utterance (default 800ms).
    pub gap: Duration,
    /// Shorter speech is dropped and listening continues (default 200ms).
    pub min_speech: Duration,
    /// Give up with a "no-speech" recognition error if nobody speaks (default 8s).
    pub no_speech_timeout: Duration,
}

impl Default for MicrophoneConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            vad_mode: 2,
            gap: Duration::from_millis(800),
            min_speech: Duration::from_millis(200),
            no_speech_timeout: Duration::from_secs(8),
        }
    }
}

/// Sets the stop flag when the recognize future goes away.
struct StopCapture(Arc<AtomicBool>);

impl Drop for StopCapture {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Production [`SpeechRecognizer`]: microphone + local endpointing + remote STT.
pub struct MicrophoneRecognizer {
    config: MicrophoneConfig,
    stt: Arc<dyn SttBackend>,
    available: bool,
}

impl MicrophoneRecognizer {
    pub fn new(config: MicrophoneConfig, stt: Arc<dyn SttBackend>) -> Self {
        let available = match AudioCapture::list_input_devices() {
            Ok(devices) => !devices.is_empty(),
            Err(e) => {
                warn!("No input devices: {}", e);
                false
            }
        };
        Self {
            config,
            stt,
            available,
        }
    }

    /// Capture until one utterance is committed. Runs on its own thread.
    fn capture(
        config: MicrophoneConfig,
        stop: Arc<AtomicBool>,
        done: oneshot::Sender<VoiceResult<PcmUtterance>>,
    ) {
        let result = Self::capture_blocking(&config, &stop);
        if let Err(ref e) = result {
            debug!("Capture ended: {}", e);
        }
        let _ = done.send(result);
    }

    fn capture_blocking(config: &MicrophoneConfig, stop: &AtomicBool) -> VoiceResult<PcmUtterance> {
        let mut vad = VadDetector::new(VadConfig {
            sample_rate: config.sample_rate,
            mode: config.vad_mode,
        })?;
        let capture = AudioCapture::new(AudioConfig {
            sample_rate: config.sample_rate,
            channels: 1,
            buffer_size: vad.chunk_size(),
        })?;
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel::<AudioChunk>();
        let _stream = capture.start_capture(chunk_tx)?;

        let (mut detector, mut events) = UtteranceDetector::new(EndpointConfig {
            silence_threshold: config.gap,
            min_speech_duration: config.min_speech,
            sample_rate: config.sample_rate,
            ..Default::default()
        });
        let started = Instant::now();
        let mut heard_speech = false;

        while let Some(chunk) = chunk_rx.blocking_recv() {
            if stop.load(Ordering::Relaxed) {
                return Err(VoiceError::Interrupted);
            }
            if chunk.samples.len() != vad.chunk_size() {
                continue;
            }
            let speech = match vad.is_speech(&chunk.samples) {
                Ok(s) => s,
                Err(e) => {
                    debug!("Skipping chunk: {}", e);
                    continue;
                }
            };
            detector.process_at(speech, &chunk.samples, chunk.timestamp)?;

            while let Ok(event) = events.try_recv() {
                match event {
                    EndpointEvent::SpeechStarted { .. } => heard_speech = true,
                    EndpointEvent::SpeechDiscarded { .. } => heard_speech = false,
                    EndpointEvent::UtteranceCommitted {
                        timestamp,
                        total_speech_duration,
                        audio_samples,
                    } => {
                        return Ok(PcmUtterance {
                            samples: audio_samples,
                            timestamp,
                            duration: total_speech_duration,
                            sample_rate: detector.sample_rate(),
                        });
                    }
                }
            }

            if !heard_speech && started.elapsed() >= config.no_speech_timeout {
                return Err(VoiceError::recognition("no-speech"));
            }
        }
        Err(VoiceError::AudioStream("input stream closed".to_string()))
    }
}

#[async_trait]
impl SpeechRecognizer for MicrophoneRecognizer {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn recognize(&self, locale: &str) -> VoiceResult<String> {
        let stop = Arc::new(AtomicBool::new(false));
        let _guard = StopCapture(Arc::clone(&stop));
        let (done_tx, done_rx) = oneshot::channel();
        let config = self.config.clone();

        thread::Builder::new()
            .name("concierge-mic".to_string())
            .spawn(move || Self::capture(config, stop, done_tx))
            .map_err(|e| VoiceError::AudioDevice(e.to_string()))?;

        let utterance = done_rx
            .await
            .map_err(|_| VoiceError::AudioStream("capture thread exited".to_string()))?
            .map_err(|e| match e {
                VoiceError::Recognition { .. } | VoiceError::Interrupted => e,
                other => VoiceError::recognition(other.to_string()),
            })?;

        info!(
            "🎯 Utterance captured ({:?}, {} samples)",
            utterance.duration,
            utterance.samples.len()
        );
        let text = self
            .stt
            .transcribe(&utterance, locale)
            .await
            .map_err(|e| VoiceError::recognition(e.to_string()))?;
        if text.is_empty() {
            return Err(VoiceError::recognition("no-match"));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let c = MicrophoneConfig::default();
        assert_eq!(c.sample_rate, 16000);
        assert_eq!(c.gap, Duration::from_millis(800));
        assert_eq!(c.min_speech, Duration::from_millis(200));
    }
}
