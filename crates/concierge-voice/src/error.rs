//! Error types for the Concierge voice layer

use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while capturing or playing speech
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    /// The platform lacks the capability (no recognizer, no output device, no API key).
    #[error("Speech capability not supported on this platform")]
    Unsupported,

    /// Recognition failed: no speech, misrecognition, permission denied, backend error.
    #[error("Speech recognition error: {detail}")]
    Recognition { detail: String },

    /// `transcribe()` was called while another capture was still pending.
    #[error("A speech capture is already in progress")]
    CaptureInProgress,

    /// Playback failed after it was requested.
    #[error("Audio playback error: {0}")]
    Playback(String),

    /// A newer `speak()` replaced this utterance before it finished.
    #[error("Utterance superseded by a newer one")]
    Superseded,

    /// `stop_listening()` / `stop_speaking()` cancelled the pending operation.
    #[error("Interrupted by stop request")]
    Interrupted,

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("VAD processing error: {0}")]
    VadProcessing(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VoiceError {
    /// Shorthand for a recognition failure with the given detail.
    pub fn recognition(detail: impl Into<String>) -> Self {
        VoiceError::Recognition {
            detail: detail.into(),
        }
    }
}

#[cfg(feature = "audio")]
impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

#[cfg(feature = "audio")]
impl From<cpal::DefaultStreamConfigError> for VoiceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

#[cfg(feature = "audio")]
impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::AudioStream(err.to_string())
    }
}

#[cfg(feature = "audio")]
impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::AudioStream(err.to_string())
    }
}
