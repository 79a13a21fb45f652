//! # Concierge Voice
//!
//! Voice I/O for the Concierge chat. The session controller sees only [`VoiceIo`]: two suspend
//! points (`transcribe`, `speak`) plus fire-and-forget stops. [`VoiceAdapter`] implements it
//! over a [`SpeechRecognizer`] and a [`SpeechSynthesizer`].
//!
//! ```text
//!  ┌──────────────────────── VoiceAdapter ────────────────────────┐
//!  │  transcribe() ─► SpeechRecognizer                            │
//!  │                    ├─ PlaceholderRecognizer (scripted)        │
//!  │                    └─ MicrophoneRecognizer  [audio]           │
//!  │                         cpal → WebRTC VAD → endpoint → STT    │
//!  │  speak()      ─► SpeechSynthesizer                           │
//!  │                    ├─ PlaceholderSynthesizer (silent)         │
//!  │                    └─ SpeakerSynthesizer    [audio]           │
//!  │                         TTS → rodio sink (one per utterance)  │
//!  └──────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
#[cfg(feature = "audio")]
pub mod audio;
pub mod endpoint;
pub mod error;
#[cfg(feature = "audio")]
pub mod microphone;
pub mod placeholder;
pub mod settings;
pub mod stt;
#[cfg(feature = "audio")]
pub mod vad;
pub mod voice_output;

pub use adapter::{SpeechRecognizer, SpeechSynthesizer, VoiceAdapter, VoiceIo, DEFAULT_LOCALE};
pub use endpoint::{EndpointConfig, EndpointEvent, UtteranceDetector};
pub use error::{VoiceError, VoiceResult};
pub use placeholder::{
    PlaceholderRecognizer, PlaceholderSynthesizer, SpokenUtterance, UtteranceLog,
};
pub use settings::{VoiceConfig, VoiceConfigPatch, VoiceIdentity};
pub use stt::{pcm_f32_to_wav, OpenAiStt, PcmUtterance, SttBackend};
pub use voice_output::{OpenAiTts, TtsBackend};

#[cfg(feature = "audio")]
pub use microphone::{MicrophoneConfig, MicrophoneRecognizer};
#[cfg(feature = "audio")]
pub use voice_output::SpeakerSynthesizer;
