//! concierge-core: conversational session controller for the scheduling assistant.
//!
//! The [`SessionController`] owns the turn rules; the [`SessionStore`] owns the state;
//! [`AssistantDispatch`] and `concierge_voice::VoiceIo` are the two outward seams.
//! [`AppointmentsClient`] is a typed client for the appointment API used by the chat UI.

mod api;
mod appointments;
mod config;
mod controller;
mod dispatch;
mod error;
mod message;
mod session;

pub use api::{ApiEnvelope, REQUEST_FAILED};
pub use appointments::{
    Appointment, AppointmentDraft, AppointmentPatch, AppointmentStatus, AppointmentsClient,
    AvailabilitySlot, HealthStatus,
};
pub use config::{ChatConfig, DEFAULT_API_BASE_URL};
pub use controller::{
    ControllerConfig, Notice, PlaybackOutcome, SessionController, SkipReason, TurnOutcome,
    CONNECTIVITY_FALLBACK, ERROR_FALLBACK,
};
pub use dispatch::{
    AssistantDispatch, AssistantReply, DispatchError, HttpAssistantClient, ReplyCategory,
};
pub use error::{CoreError, CoreResult};
pub use message::{Message, MessageCategory, MessageId, NewMessage, Sender};
pub use session::{Session, SessionStore, Status};

// Voice types that appear in this crate's public API.
pub use concierge_voice::{VoiceConfig, VoiceConfigPatch, VoiceIdentity};
