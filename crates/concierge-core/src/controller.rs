//! **Session controller**: Runs one conversational turn at a time.
//!
//! ```text
//!   Idle ──submit_text──────────────────────────► Dispatching ──► Idle
//!     └──start_voice_turn──► Capturing ──transcript──┘
//! ```
//!
//! Admission is a check-then-set inside one store transaction, before the first await.
//! Either kind of turn is admitted only while `thinking` and `listening` are both down.
//! `thinking`/`typing_indicator` are lowered by a drop guard, so every exit path (reply,
//! failure, panic in the dispatch task, timeout, the caller dropping the future) ends the turn.

use crate::config::ChatConfig;
use crate::dispatch::{AssistantDispatch, AssistantReply, DispatchError};
use crate::message::{Message, MessageCategory, NewMessage};
use crate::session::{Session, SessionStore, Status, Transaction};
use concierge_voice::{VoiceConfig, VoiceConfigPatch, VoiceError, VoiceIdentity, VoiceIo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Shown when the assistant failed without saying why.
pub const ERROR_FALLBACK: &str = "Sorry, I encountered an error processing your request.";
/// Shown when the round trip itself broke down (panic, time limit).
pub const CONNECTIVITY_FALLBACK: &str =
    "Sorry, I'm having trouble connecting right now. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nothing but whitespace.
    EmptyInput,
    /// Another turn is thinking or listening.
    Busy,
}

/// Transient feedback for the caller; never written to the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Unsupported,
    CaptureFailed { detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Voice output is disabled.
    Skipped,
    Completed,
    Failed(String),
    Superseded,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Skipped(SkipReason),
    Answered {
        message: Message,
        playback: PlaybackOutcome,
    },
    /// The agent's error message that was appended.
    Failed { message: Message },
    Notice(Notice),
}

/// Optional hardening bounds. Both unbounded by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerConfig {
    pub dispatch_timeout: Option<Duration>,
    pub transcribe_timeout: Option<Duration>,
}

impl From<&ChatConfig> for ControllerConfig {
    fn from(config: &ChatConfig) -> Self {
        Self {
            dispatch_timeout: config.dispatch_timeout(),
            transcribe_timeout: config.transcribe_timeout(),
        }
    }
}

enum DispatchFailure {
    Typed(DispatchError),
    Unexpected(String),
}

/// Lowers `thinking` and `typing_indicator` when the turn ends, however it ends.
struct TurnGuard<'a>(&'a SessionStore);

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.0.transact(|txn| {
            txn.set_thinking(false);
            txn.set_typing_indicator(false);
        });
    }
}

/// Lowers `listening` if the capture is abandoned before its transcript settles.
struct ListeningGuard<'a> {
    store: &'a SessionStore,
    armed: bool,
}

impl<'a> ListeningGuard<'a> {
    fn new(store: &'a SessionStore) -> Self {
        Self { store, armed: true }
    }

    /// The transcript settled; `listening` is handled by the caller from here on.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ListeningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.store.transact(|txn| txn.set_listening(false));
        }
    }
}

/// Aborts the dispatch task if the turn is dropped while waiting on it.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Admit a turn: reject blank or busy input, else append the user message and raise the flags.
fn open_turn(txn: &mut Transaction<'_>, text: &str) -> Result<Message, SkipReason> {
    if text.trim().is_empty() {
        return Err(SkipReason::EmptyInput);
    }
    let session = txn.session();
    if session.thinking || session.listening {
        return Err(SkipReason::Busy);
    }
    let message = txn.append(NewMessage::user(text));
    txn.set_thinking(true);
    txn.set_typing_indicator(true);
    Ok(message)
}

#[derive(Clone)]
pub struct SessionController {
    store: Arc<SessionStore>,
    dispatch: Arc<dyn AssistantDispatch>,
    voice: Arc<dyn VoiceIo>,
    config: ControllerConfig,
}

impl SessionController {
    pub fn new(
        store: Arc<SessionStore>,
        dispatch: Arc<dyn AssistantDispatch>,
        voice: Arc<dyn VoiceIo>,
    ) -> Self {
        Self {
            store,
            dispatch,
            voice,
            config: ControllerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Typed input. Content is stored and sent exactly as submitted.
    pub async fn submit_text(&self, text: &str) -> TurnOutcome {
        match self.store.transact(|txn| open_turn(txn, text)) {
            Ok(user_message) => self.run_turn(user_message).await,
            Err(reason) => {
                debug!(?reason, "typed input skipped");
                TurnOutcome::Skipped(reason)
            }
        }
    }

    /// Capture one utterance and run it as if it had been typed.
    pub async fn start_voice_turn(&self) -> TurnOutcome {
        if !self.voice.is_supported() {
            info!("voice input requested but not supported");
            return TurnOutcome::Notice(Notice::Unsupported);
        }

        let admitted = self.store.transact(|txn| {
            let session = txn.session();
            if session.listening || session.thinking {
                return false;
            }
            txn.set_listening(true);
            true
        });
        if !admitted {
            debug!("voice turn skipped: busy");
            return TurnOutcome::Skipped(SkipReason::Busy);
        }
        let mut listening = ListeningGuard::new(&self.store);

        let transcript = match self.config.transcribe_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.voice.transcribe()).await {
                Ok(result) => result,
                Err(_) => {
                    self.voice.stop_listening();
                    Err(VoiceError::recognition("timed out waiting for speech"))
                }
            },
            None => self.voice.transcribe().await,
        };
        listening.disarm();

        match transcript {
            Ok(text) => {
                info!(chars = text.len(), "transcript received");
                // Hand over from listening to thinking in one step.
                let opened = self.store.transact(|txn| {
                    txn.set_listening(false);
                    open_turn(txn, &text)
                });
                match opened {
                    Ok(user_message) => self.run_turn(user_message).await,
                    Err(reason) => TurnOutcome::Skipped(reason),
                }
            }
            Err(err) => {
                self.store.transact(|txn| txn.set_listening(false));
                warn!(error = %err, "voice capture failed");
                let detail = match err {
                    VoiceError::Recognition { detail } => detail,
                    other => other.to_string(),
                };
                TurnOutcome::Notice(Notice::CaptureFailed { detail })
            }
        }
    }

    async fn run_turn(&self, user_message: Message) -> TurnOutcome {
        let _turn = TurnGuard(&self.store);
        info!(message_id = %user_message.id, "turn started");

        match self.dispatch_reply(user_message.content).await {
            Ok(reply) => {
                let category = reply
                    .category
                    .map(MessageCategory::from)
                    .unwrap_or_default();
                let message = self
                    .store
                    .append(NewMessage::agent(reply.reply_text, category));
                info!(message_id = %message.id, category = category.as_str(), "reply appended");

                let voice = self.store.voice();
                let playback = if voice.enabled {
                    self.play(&message.content, &voice).await
                } else {
                    PlaybackOutcome::Skipped
                };
                TurnOutcome::Answered { message, playback }
            }
            Err(failure) => {
                let content = match failure {
                    DispatchFailure::Typed(err) => {
                        warn!(error = %err, "assistant request failed");
                        err.reason().unwrap_or(ERROR_FALLBACK).to_string()
                    }
                    DispatchFailure::Unexpected(detail) => {
                        warn!(%detail, "assistant round trip broke down");
                        CONNECTIVITY_FALLBACK.to_string()
                    }
                };
                let message = self
                    .store
                    .append(NewMessage::agent(content, MessageCategory::Error));
                TurnOutcome::Failed { message }
            }
        }
    }

    /// The round trip runs in its own task so a panic in the client stays contained.
    async fn dispatch_reply(&self, text: String) -> Result<AssistantReply, DispatchFailure> {
        let dispatch = Arc::clone(&self.dispatch);
        let handle = tokio::spawn(async move { dispatch.send(&text).await });
        let _abort = AbortOnDrop(handle.abort_handle());

        let joined = match self.config.dispatch_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(DispatchFailure::Unexpected(format!(
                        "no reply within {:?}",
                        limit
                    )))
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(DispatchFailure::Typed(err)),
            Err(join_err) => Err(DispatchFailure::Unexpected(join_err.to_string())),
        }
    }

    async fn play(&self, text: &str, voice: &VoiceConfig) -> PlaybackOutcome {
        match self.voice.speak(text, voice).await {
            Ok(()) => PlaybackOutcome::Completed,
            Err(VoiceError::Superseded) => PlaybackOutcome::Superseded,
            Err(VoiceError::Interrupted) => PlaybackOutcome::Interrupted,
            Err(err) => {
                warn!(error = %err, "playback failed");
                PlaybackOutcome::Failed(err.to_string())
            }
        }
    }

    /// Best effort; the pending voice turn resets `listening` when the capture settles.
    pub fn stop_listening(&self) {
        self.voice.stop_listening();
    }

    pub fn stop_speaking(&self) {
        self.voice.stop_speaking();
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Merge a partial voice update. Turning voice off also silences the current reply.
    pub fn update_voice(&self, patch: VoiceConfigPatch) -> VoiceConfig {
        let disabling = patch.enabled == Some(false);
        let updated = self.store.update_voice(patch);
        if disabling {
            self.voice.stop_speaking();
        }
        updated
    }

    pub fn snapshot(&self) -> Session {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.store.subscribe()
    }

    pub fn status(&self) -> Status {
        self.store.status()
    }

    pub fn is_voice_supported(&self) -> bool {
        self.voice.is_supported()
    }

    pub fn available_voices(&self) -> Vec<VoiceIdentity> {
        self.voice.available_voices()
    }
}
