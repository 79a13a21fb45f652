//! Voice Activity Detection using WebRTC VAD
//!
//! Classifies each 30ms chunk as speech or silence for the utterance detector.

use crate::error::{VoiceError, VoiceResult};
use tracing::{debug, info};
use webrtc_vad::{SampleRate, Vad, VadMode};

/// Configuration for VAD detection
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Sample rate (must be 8000, 16000, 32000, or 48000 Hz for WebRTC VAD)
    pub sample_rate: u32,

    /// Detection mode (0-3, where 3 is most aggressive)
    pub mode: u8,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            mode: 2,
        }
    }
}

/// Voice Activity Detector using WebRTC VAD
pub struct VadDetector {
    vad: Vad,
    chunk_size: usize,
}

fn vad_mode(mode: u8) -> VoiceResult<VadMode> {
    match mode {
        0 => Ok(VadMode::Quality),
        1 => Ok(VadMode::LowBitrate),
        2 => Ok(VadMode::Aggressive),
        3 => Ok(VadMode::VeryAggressive),
        other => Err(VoiceError::Config(format!("VAD mode must be 0-3, got {}", other))),
    }
}

fn vad_rate(sample_rate: u32) -> VoiceResult<SampleRate> {
    match sample_rate {
        8000 => Ok(SampleRate::Rate8kHz),
        16000 => Ok(SampleRate::Rate16kHz),
        32000 => Ok(SampleRate::Rate32kHz),
        48000 => Ok(SampleRate::Rate48kHz),
        other => Err(VoiceError::Config(format!(
            "WebRTC VAD only supports 8000, 16000, 32000, or 48000 Hz, got {}",
            other
        ))),
    }
}

impl VadDetector {
    pub fn new(config: VadConfig) -> VoiceResult<Self> {
        let mode = vad_mode(config.mode)?;
        let rate = vad_rate(config.sample_rate)?;

        // WebRTC VAD accepts 10, 20 or 30ms frames; we always use 30ms.
        let chunk_size = (config.sample_rate as usize * 30) / 1000;

        let mut vad = Vad::new();
        vad.set_mode(mode);
        vad.set_sample_rate(rate);

        info!(
            "🎙️ VAD ready ({}Hz, mode {}, {} samples/chunk)",
            config.sample_rate, config.mode, chunk_size
        );
        Ok(Self { vad, chunk_size })
    }

    /// Whether `audio` (exactly `chunk_size` samples) contains speech.
    pub fn is_speech(&mut self, audio: &[f32]) -> VoiceResult<bool> {
        if audio.len() != self.chunk_size {
            return Err(VoiceError::VadProcessing(format!(
                "Expected {} samples, got {}",
                self.chunk_size,
                audio.len()
            )));
        }

        let audio_i16: Vec<i16> = audio
            .iter()
            .map(|&sample| (sample.clamp(-1.0, 1.0) * 32767.0) as i16)
            .collect();

        let speech = self
            .vad
            .is_voice_segment(&audio_i16)
            .map_err(|e| VoiceError::VadProcessing(format!("VAD processing failed: {:?}", e)))?;
        debug!("VAD: {}", if speech { "SPEECH" } else { "SILENCE" });
        Ok(speech)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_is_30ms() {
        let detector = VadDetector::new(VadConfig::default()).unwrap();
        assert_eq!(detector.chunk_size(), 480);
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let config = VadConfig {
            sample_rate: 44100,
            ..Default::default()
        };
        assert!(VadDetector::new(config).is_err());
    }

    #[test]
    fn rejects_wrong_chunk_size() {
        let mut detector = VadDetector::new(VadConfig::default()).unwrap();
        assert!(detector.is_speech(&[0.0; 100]).is_err());
    }

    #[test]
    fn silence_is_not_speech() {
        let mut detector = VadDetector::new(VadConfig::default()).unwrap();
        assert!(!detector.is_speech(&[0.0; 480]).unwrap());
    }
}
