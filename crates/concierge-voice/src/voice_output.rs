//! **Voice output**: Text-to-speech backends and speaker playback.
//!
//! `TtsBackend` turns text into encoded audio (WAV/MP3). With the `audio` feature,
//! `SpeakerSynthesizer` plays that audio through the default output device and is the
//! production `SpeechSynthesizer` used by the chat client.

use crate::error::{VoiceError, VoiceResult};
use crate::settings::{VoiceConfig, VoiceIdentity};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Backend that turns text into audio bytes (WAV/MP3).
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Synthesize `text` with the given settings. Return an empty vec to skip playback.
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> VoiceResult<Vec<u8>>;

    /// Voices this backend accepts in `VoiceConfig::voice`.
    fn voices(&self) -> Vec<VoiceIdentity> {
        Vec::new()
    }
}

/// Voices offered by OpenAI-compatible speech endpoints.
const OPENAI_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];
const DEFAULT_VOICE: &str = "alloy";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

/// Production TTS backend: OpenAI-compatible `/audio/speech` API.
/// Uses `TTS_API_URL` (e.g. https://api.openai.com/v1), `TTS_API_KEY` and `TTS_MODEL`.
#[derive(Debug, Clone)]
pub struct OpenAiTts {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// TTS model: tts-1 (fast) or tts-1-hd (higher quality).
    pub model: String,
    client: reqwest::Client,
}

impl OpenAiTts {
    /// Build from environment: TTS_API_URL, TTS_API_KEY (or OPENAI_API_KEY), TTS_MODEL.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("TTS_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let api_key = std::env::var("TTS_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| {
                VoiceError::Config("TTS requires TTS_API_KEY or OPENAI_API_KEY".to_string())
            })?;
        let model = std::env::var("TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        Self::new(base_url, api_key, model)
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Requested voice if the endpoint knows it, else the default.
    fn voice_id<'a>(&self, config: &'a VoiceConfig) -> &'a str {
        match config.voice.as_deref() {
            Some(v) if OPENAI_VOICES.iter().any(|known| known.eq_ignore_ascii_case(v)) => v,
            Some(v) => {
                tracing::debug!("Unknown TTS voice {:?}, using {}", v, DEFAULT_VOICE);
                DEFAULT_VOICE
            }
            None => DEFAULT_VOICE,
        }
    }
}

#[async_trait]
impl TtsBackend for OpenAiTts {
    async fn synthesize(&self, text: &str, config: &VoiceConfig) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        // The speech endpoint has no pitch control; rate maps to speed (0.25..4.0).
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice: self.voice_id(config),
            speed: config.rate.clamp(0.25, 4.0),
        };
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().await.map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn voices(&self) -> Vec<VoiceIdentity> {
        OPENAI_VOICES
            .iter()
            .map(|name| VoiceIdentity::new(*name, "en"))
            .collect()
    }
}

#[cfg(feature = "audio")]
mod speaker {
    use super::*;
    use crate::adapter::SpeechSynthesizer;
    use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::thread;
    use tokio::sync::{mpsc, oneshot};
    use tracing::{error, info};

    /// A request to the playback thread: decode `bytes`, play, report when done.
    struct PlayRequest {
        bytes: Vec<u8>,
        volume: f32,
        sink_tx: oneshot::Sender<VoiceResult<Arc<Sink>>>,
    }

    /// Stops the sink if the playback future is dropped (supersession / stop_speaking).
    struct StopOnDrop(Arc<Sink>);

    impl Drop for StopOnDrop {
        fn drop(&mut self) {
            if !self.0.empty() {
                self.0.stop();
                info!("⏹️ Playback stopped");
            }
        }
    }

    /// Speaker playback of TTS audio. One `Sink` per utterance, so stopping an old
    /// utterance never touches the new one.
    ///
    /// `rodio::OutputStream` is `!Send` on some platforms, so it lives on a dedicated thread;
    /// the synthesizer only holds a channel to it.
    pub struct SpeakerSynthesizer {
        tts: Arc<dyn TtsBackend>,
        play_tx: mpsc::UnboundedSender<PlayRequest>,
    }

    impl SpeakerSynthesizer {
        /// Open the default output device.
        pub fn new(tts: Arc<dyn TtsBackend>) -> VoiceResult<Self> {
            let (play_tx, mut play_rx) = mpsc::unbounded_channel::<PlayRequest>();
            let (ready_tx, ready_rx) = std::sync::mpsc::channel::<VoiceResult<()>>();

            thread::spawn(move || {
                let (_stream, handle): (OutputStream, OutputStreamHandle) =
                    match OutputStream::try_default() {
                        Ok(pair) => {
                            let _ = ready_tx.send(Ok(()));
                            pair
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(VoiceError::Playback(e.to_string())));
                            return;
                        }
                    };
                info!("🔊 Speaker ready");
                while let Some(req) = play_rx.blocking_recv() {
                    let result = Sink::try_new(&handle)
                        .map_err(|e| VoiceError::Playback(e.to_string()))
                        .and_then(|sink| {
                            let source = rodio::Decoder::new(Cursor::new(req.bytes))
                                .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
                            sink.set_volume(req.volume);
                            sink.append(source.convert_samples::<f32>());
                            Ok(Arc::new(sink))
                        });
                    if let Err(ref e) = result {
                        error!("Speaker: {}", e);
                    }
                    let _ = req.sink_tx.send(result);
                }
            });

            ready_rx
                .recv()
                .map_err(|_| VoiceError::Playback("speaker thread exited".to_string()))??;
            Ok(Self { tts, play_tx })
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for SpeakerSynthesizer {
        fn voices(&self) -> Vec<VoiceIdentity> {
            self.tts.voices()
        }

        async fn speak(&self, text: &str, config: &VoiceConfig) -> VoiceResult<()> {
            let bytes = self.tts.synthesize(text, config).await?;
            if bytes.is_empty() {
                return Ok(());
            }
            let (sink_tx, sink_rx) = oneshot::channel();
            self.play_tx
                .send(PlayRequest {
                    bytes,
                    volume: config.volume,
                    sink_tx,
                })
                .map_err(|_| VoiceError::Playback("speaker thread exited".to_string()))?;
            let sink = sink_rx
                .await
                .map_err(|_| VoiceError::Playback("speaker thread exited".to_string()))??;
            let guard = StopOnDrop(Arc::clone(&sink));

            // Poll for completion; dropping this future drops the guard and silences the sink.
            while !guard.0.empty() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(())
        }
    }
}

#[cfg(feature = "audio")]
pub use speaker::SpeakerSynthesizer;
