//! **VoiceAdapter**: The two suspend points (`transcribe`, `speak`) over pluggable backends.
//!
//! Backends are callback-free: a recognizer future settles with one utterance, a synthesizer
//! future settles when playback ends. The adapter adds the contract on top:
//!
//! - at most one capture pending; a second `transcribe()` fails with `CaptureInProgress`;
//! - at most one utterance playing; a newer `speak()` wins and the superseded caller
//!   resolves with `Superseded` instead of hanging;
//! - `stop_listening()` / `stop_speaking()` resolve the pending caller with `Interrupted`
//!   and are no-ops when idle.
//!
//! Cancellation is drop-based: the losing branch of the `select!` drops the backend future,
//! so backends release devices in their `Drop` impls.

use crate::error::{VoiceError, VoiceResult};
use crate::settings::{VoiceConfig, VoiceIdentity};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Locale used when none is configured.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Platform speech capture: one finalized utterance per call.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Whether capture can work at all (device present, API key configured...).
    fn is_available(&self) -> bool {
        true
    }

    /// Capture and recognize exactly one utterance in `locale`.
    async fn recognize(&self, locale: &str) -> VoiceResult<String>;
}

/// Platform speech playback: resolves when the utterance has been fully played.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    /// Voices this backend can speak with.
    fn voices(&self) -> Vec<VoiceIdentity> {
        Vec::new()
    }

    /// Speak `text` with the given settings and wait for playback to end.
    async fn speak(&self, text: &str, config: &VoiceConfig) -> VoiceResult<()>;
}

/// The contract the session controller depends on.
#[async_trait]
pub trait VoiceIo: Send + Sync {
    /// True when both capture and playback are available.
    fn is_supported(&self) -> bool;

    /// Suspend until one utterance is recognized.
    async fn transcribe(&self) -> VoiceResult<String>;

    /// Speak `text`; no-op success when `config.enabled` is false.
    async fn speak(&self, text: &str, config: &VoiceConfig) -> VoiceResult<()>;

    /// Cancel a pending capture. Idempotent.
    fn stop_listening(&self);

    /// Cancel the current utterance. Idempotent.
    fn stop_speaking(&self);

    /// Voices for the configured locale.
    fn available_voices(&self) -> Vec<VoiceIdentity> {
        Vec::new()
    }
}

/// Why a pending operation was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cancel {
    Superseded,
    Stopped,
}

impl Cancel {
    fn into_error(self) -> VoiceError {
        match self {
            Cancel::Superseded => VoiceError::Superseded,
            Cancel::Stopped => VoiceError::Interrupted,
        }
    }
}

/// The pending operation's cancel handle, tagged so a finished call only clears its own slot.
struct Pending {
    generation: u64,
    cancel: oneshot::Sender<Cancel>,
}

#[derive(Default)]
struct Slot {
    inner: Mutex<Option<Pending>>,
}

impl Slot {
    fn lock(&self) -> MutexGuard<'_, Option<Pending>> {
        // A poisoned slot only holds a cancel handle; keep using it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_occupied(&self) -> bool {
        self.lock().is_some()
    }

    fn release(&self, generation: u64) {
        let mut slot = self.lock();
        if slot.as_ref().map(|p| p.generation) == Some(generation) {
            *slot = None;
        }
    }

    fn cancel(&self, reason: Cancel) -> bool {
        match self.lock().take() {
            Some(pending) => {
                let _ = pending.cancel.send(reason);
                true
            }
            None => false,
        }
    }
}

/// Removes the slot entry when the call finishes or its future is dropped.
struct SlotRelease<'a> {
    slot: &'a Slot,
    generation: u64,
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        self.slot.release(self.generation);
    }
}

/// Composes a recognizer and a synthesizer into a [`VoiceIo`].
pub struct VoiceAdapter {
    recognizer: Arc<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    locale: String,
    generation: AtomicU64,
    capture: Slot,
    playback: Slot,
}

impl VoiceAdapter {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            recognizer,
            synthesizer,
            locale: DEFAULT_LOCALE.to_string(),
            generation: AtomicU64::new(0),
            capture: Slot::default(),
            playback: Slot::default(),
        }
    }

    /// Fix recognition (and voice filtering) to `locale`, e.g. "en-GB".
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Whether a capture is currently pending.
    pub fn is_capturing(&self) -> bool {
        self.capture.is_occupied()
    }

    /// Whether an utterance is currently playing.
    pub fn is_speaking(&self) -> bool {
        self.playback.is_occupied()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl VoiceIo for VoiceAdapter {
    fn is_supported(&self) -> bool {
        self.recognizer.is_available() && self.synthesizer.is_available()
    }

    async fn transcribe(&self) -> VoiceResult<String> {
        if !self.recognizer.is_available() {
            return Err(VoiceError::Unsupported);
        }

        let generation = self.next_generation();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        {
            let mut slot = self.capture.lock();
            if slot.is_some() {
                warn!("transcribe() called while a capture is pending");
                return Err(VoiceError::CaptureInProgress);
            }
            *slot = Some(Pending {
                generation,
                cancel: cancel_tx,
            });
        }
        let _release = SlotRelease {
            slot: &self.capture,
            generation,
        };

        info!("🎤 Listening ({})", self.locale);
        tokio::select! {
            result = self.recognizer.recognize(&self.locale) => {
                match &result {
                    Ok(text) => debug!("Recognized {} chars", text.len()),
                    Err(e) => warn!("Recognition failed: {}", e),
                }
                result
            }
            reason = cancel_rx => {
                let reason = reason.unwrap_or(Cancel::Stopped);
                info!("🛑 Capture cancelled ({:?})", reason);
                Err(reason.into_error())
            }
        }
    }

    async fn speak(&self, text: &str, config: &VoiceConfig) -> VoiceResult<()> {
        if !config.enabled {
            return Ok(());
        }

        let generation = self.next_generation();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let previous = self.playback.lock().replace(Pending {
            generation,
            cancel: cancel_tx,
        });
        if let Some(previous) = previous {
            debug!("Superseding utterance #{}", previous.generation);
            let _ = previous.cancel.send(Cancel::Superseded);
        }
        let _release = SlotRelease {
            slot: &self.playback,
            generation,
        };

        info!("🔊 Speaking {} chars", text.len());
        tokio::select! {
            result = self.synthesizer.speak(text, config) => {
                if let Err(ref e) = result {
                    warn!("Playback failed: {}", e);
                }
                result
            }
            reason = cancel_rx => {
                // A dropped sender means the slot was torn down; treat as superseded.
                let reason = reason.unwrap_or(Cancel::Superseded);
                info!("⏹️ Utterance #{} ended early ({:?})", generation, reason);
                Err(reason.into_error())
            }
        }
    }

    fn stop_listening(&self) {
        if self.capture.cancel(Cancel::Stopped) {
            info!("stop_listening: capture cancelled");
        }
    }

    fn stop_speaking(&self) {
        if self.playback.cancel(Cancel::Stopped) {
            info!("stop_speaking: playback cancelled");
        }
    }

    fn available_voices(&self) -> Vec<VoiceIdentity> {
        self.synthesizer
            .voices()
            .into_iter()
            .filter(|v| v.matches_locale(&self.locale))
            .collect()
    }
}
