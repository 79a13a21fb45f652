//! Placeholder backends: no microphone, no speaker.
//!
//! Use them to run the chat without audio hardware, and in tests to script what the
//! "platform" does (recognize a fixed phrase, fail, never finish, play for a while).

use crate::adapter::{SpeechRecognizer, SpeechSynthesizer};
use crate::error::{VoiceError, VoiceResult};
use crate::settings::{VoiceConfig, VoiceIdentity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Script {
    Respond(String),
    Fail(String),
    Hang,
    Unsupported,
}

/// Recognizer that plays back a script instead of listening.
#[derive(Debug, Clone)]
pub struct PlaceholderRecognizer {
    script: Script,
}

impl PlaceholderRecognizer {
    /// Every capture recognizes `text`.
    pub fn with_response(text: impl Into<String>) -> Self {
        Self {
            script: Script::Respond(text.into()),
        }
    }

    /// Every capture fails with a recognition error carrying `detail`.
    pub fn failing(detail: impl Into<String>) -> Self {
        Self {
            script: Script::Fail(detail.into()),
        }
    }

    /// Captures never finish on their own; only `stop_listening()` ends them.
    pub fn hanging() -> Self {
        Self {
            script: Script::Hang,
        }
    }

    /// The platform has no speech recognition.
    pub fn unsupported() -> Self {
        Self {
            script: Script::Unsupported,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for PlaceholderRecognizer {
    fn is_available(&self) -> bool {
        !matches!(self.script, Script::Unsupported)
    }

    async fn recognize(&self, _locale: &str) -> VoiceResult<String> {
        match &self.script {
            Script::Respond(text) => Ok(text.clone()),
            Script::Fail(detail) => Err(VoiceError::recognition(detail.clone())),
            Script::Hang => std::future::pending().await,
            Script::Unsupported => Err(VoiceError::Unsupported),
        }
    }
}

/// One utterance the placeholder synthesizer was asked to play.
#[derive(Debug, Clone)]
pub struct SpokenUtterance {
    pub text: String,
    pub config: VoiceConfig,
    pub started_at: DateTime<Utc>,
}

/// Shared record of everything a [`PlaceholderSynthesizer`] started playing.
#[derive(Debug, Clone, Default)]
pub struct UtteranceLog {
    inner: Arc<Mutex<Vec<SpokenUtterance>>>,
}

impl UtteranceLog {
    pub fn utterances(&self) -> Vec<SpokenUtterance> {
        self.inner.lock().map(|v| v.clone()).unwrap_or_default()
    }

    fn push(&self, utterance: SpokenUtterance) {
        if let Ok(mut v) = self.inner.lock() {
            v.push(utterance);
        }
    }
}

/// Synthesizer that records utterances instead of making sound.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderSynthesizer {
    hold: Option<Duration>,
    failure: Option<String>,
    voices: Vec<VoiceIdentity>,
    log: UtteranceLog,
}

impl PlaceholderSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend each utterance takes `hold` to play.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = Some(hold);
        self
    }

    /// Every playback fails with `detail`.
    pub fn failing(mut self, detail: impl Into<String>) -> Self {
        self.failure = Some(detail.into());
        self
    }

    pub fn with_voices(mut self, voices: Vec<VoiceIdentity>) -> Self {
        self.voices = voices;
        self
    }

    /// Handle to the utterance record; stays valid after the synthesizer moves into an adapter.
    pub fn log(&self) -> UtteranceLog {
        self.log.clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for PlaceholderSynthesizer {
    fn voices(&self) -> Vec<VoiceIdentity> {
        self.voices.clone()
    }

    async fn speak(&self, text: &str, config: &VoiceConfig) -> VoiceResult<()> {
        self.log.push(SpokenUtterance {
            text: text.to_string(),
            config: config.clone(),
            started_at: Utc::now(),
        });
        if let Some(hold) = self.hold {
            tokio::time::sleep(hold).await;
        }
        match &self.failure {
            Some(detail) => Err(VoiceError::Playback(detail.clone())),
            None => Ok(()),
        }
    }
}
