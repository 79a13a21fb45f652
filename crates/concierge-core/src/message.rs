//! Transcript entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Creation-ordered message identifier. Starts at 1; never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// How a message is presented. Agent replies carry the category the assistant's action maps to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    #[default]
    Text,
    Appointment,
    Availability,
    Error,
}

impl MessageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCategory::Text => "text",
            MessageCategory::Appointment => "appointment",
            MessageCategory::Availability => "availability",
            MessageCategory::Error => "error",
        }
    }
}

/// One transcript entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    pub category: MessageCategory,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_from_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// What the controller hands the store; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub content: String,
    pub sender: Sender,
    pub category: MessageCategory,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: Sender::User,
            category: MessageCategory::Text,
        }
    }

    pub fn agent(content: impl Into<String>, category: MessageCategory) -> Self {
        Self {
            content: content.into(),
            sender: Sender::Agent,
            category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_lowercase() {
        assert_eq!(
            serde_json::to_string(&MessageCategory::Availability).unwrap(),
            "\"availability\""
        );
        assert_eq!(serde_json::to_string(&Sender::Agent).unwrap(), "\"agent\"");
        assert_eq!(serde_json::to_string(&MessageId(7)).unwrap(), "7");
    }

    #[test]
    fn category_defaults_to_text() {
        assert_eq!(MessageCategory::default(), MessageCategory::Text);
        assert_eq!(NewMessage::user("hi").category, MessageCategory::Text);
    }
}
