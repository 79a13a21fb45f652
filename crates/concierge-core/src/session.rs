//! **Session store**: The single source of truth for one conversation.
//!
//! Backed by a `tokio::sync::watch` channel: every mutation is synchronous, applied in place
//! under the channel's write lock, and immediately visible to subscribers. Nothing here fails
//! and nothing validates flag combinations; the controller owns the turn rules.

use crate::message::{Message, MessageId, NewMessage};
use chrono::{DateTime, Utc};
use concierge_voice::{VoiceConfig, VoiceConfigPatch};
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// Snapshot of a conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub messages: Vec<Message>,
    pub listening: bool,
    pub thinking: bool,
    pub typing_indicator: bool,
    pub voice: VoiceConfig,
}

impl Session {
    pub fn status(&self) -> Status {
        if self.listening {
            Status::Listening
        } else if self.thinking {
            Status::Thinking
        } else if self.typing_indicator {
            Status::Typing
        } else {
            Status::Online
        }
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// What the status line shows, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Listening,
    Thinking,
    Typing,
    Online,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Listening => "Listening",
            Status::Thinking => "Thinking",
            Status::Typing => "Typing",
            Status::Online => "Online",
        };
        f.write_str(label)
    }
}

/// Owned, injectable store. Share it with `Arc`.
pub struct SessionStore {
    tx: watch::Sender<Session>,
    next_id: AtomicU64,
    last_created_micros: AtomicI64,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(VoiceConfig::default())
    }
}

impl SessionStore {
    /// Empty log, all flags down, the given voice settings.
    pub fn new(voice: VoiceConfig) -> Self {
        let (tx, _rx) = watch::channel(Session {
            voice,
            ..Default::default()
        });
        Self {
            tx,
            next_id: AtomicU64::new(1),
            last_created_micros: AtomicI64::new(i64::MIN),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> Status {
        self.tx.borrow().status()
    }

    pub fn voice(&self) -> VoiceConfig {
        self.tx.borrow().voice.clone()
    }

    /// Append a message; the store assigns its id and creation time.
    pub fn append(&self, message: NewMessage) -> Message {
        self.transact(|txn| txn.append(message))
    }

    pub fn set_listening(&self, listening: bool) {
        self.tx.send_modify(|s| s.listening = listening);
    }

    pub fn set_thinking(&self, thinking: bool) {
        self.tx.send_modify(|s| s.thinking = thinking);
    }

    pub fn set_typing_indicator(&self, typing: bool) {
        self.tx.send_modify(|s| s.typing_indicator = typing);
    }

    /// Merge a partial voice update; unspecified fields are retained. Returns the result.
    pub fn update_voice(&self, patch: VoiceConfigPatch) -> VoiceConfig {
        let mut updated = VoiceConfig::default();
        self.tx.send_modify(|s| {
            s.voice.apply(patch);
            updated = s.voice.clone();
        });
        debug!(?updated, "voice settings updated");
        updated
    }

    /// Empty the log. Voice settings and flags are kept; ids keep counting.
    pub fn clear(&self) {
        self.tx.send_modify(|s| s.messages.clear());
    }

    /// Run `f` against the session under the write lock, so a check and the update it
    /// guards happen in one step. Subscribers are only notified when `f` changed something.
    pub(crate) fn transact<R>(&self, f: impl FnOnce(&mut Transaction<'_>) -> R) -> R {
        let mut output = None;
        self.tx.send_if_modified(|session| {
            let mut txn = Transaction {
                session,
                store: self,
                modified: false,
            };
            output = Some(f(&mut txn));
            txn.modified
        });
        match output {
            Some(output) => output,
            None => unreachable!("send_if_modified runs its closure exactly once"),
        }
    }

    fn next_stamp(&self) -> (MessageId, DateTime<Utc>) {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = Utc::now();
        let previous = self.last_created_micros.load(Ordering::Relaxed);
        let micros = now.timestamp_micros().max(previous.saturating_add(1));
        self.last_created_micros.store(micros, Ordering::Relaxed);
        let created_at = DateTime::from_timestamp_micros(micros).unwrap_or(now);
        (id, created_at)
    }
}

/// Mutable view handed to [`SessionStore::transact`].
pub(crate) struct Transaction<'a> {
    session: &'a mut Session,
    store: &'a SessionStore,
    modified: bool,
}

impl Transaction<'_> {
    pub(crate) fn session(&self) -> &Session {
        &*self.session
    }

    pub(crate) fn append(&mut self, message: NewMessage) -> Message {
        // Called under the watch write lock, so id order matches log order.
        let (id, created_at) = self.store.next_stamp();
        let message = Message {
            id,
            content: message.content,
            sender: message.sender,
            category: message.category,
            created_at,
        };
        self.session.messages.push(message.clone());
        self.modified = true;
        message
    }

    pub(crate) fn set_listening(&mut self, listening: bool) {
        if self.session.listening != listening {
            self.session.listening = listening;
            self.modified = true;
        }
    }

    pub(crate) fn set_thinking(&mut self, thinking: bool) {
        if self.session.thinking != thinking {
            self.session.thinking = thinking;
            self.modified = true;
        }
    }

    pub(crate) fn set_typing_indicator(&mut self, typing: bool) {
        if self.session.typing_indicator != typing {
            self.session.typing_indicator = typing;
            self.modified = true;
        }
    }
}
