//! Integration test: HTTP speech backends and the adapter contract end to end.
//!
//! The STT/TTS clients run against an in-process axum server standing in for an
//! OpenAI-compatible API.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use concierge_voice::{
    OpenAiStt, OpenAiTts, PcmUtterance, PlaceholderRecognizer, PlaceholderSynthesizer,
    SttBackend, TtsBackend, VoiceAdapter, VoiceConfig, VoiceError, VoiceIo,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

fn utterance() -> PcmUtterance {
    PcmUtterance {
        samples: vec![0.1; 1600],
        timestamp: chrono::Utc::now(),
        duration: Duration::from_millis(100),
        sample_rate: 16000,
    }
}

#[tokio::test]
async fn stt_uploads_wav_and_trims_transcript() {
    let seen: Arc<Mutex<Option<(String, Vec<u8>)>>> = Arc::default();
    let seen_in_handler = Arc::clone(&seen);
    let app = Router::new().route(
        "/v1/audio/transcriptions",
        post(move |headers: HeaderMap, body: Bytes| {
            let seen = Arc::clone(&seen_in_handler);
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                *seen.lock().unwrap() = Some((auth, body.to_vec()));
                Json(json!({ "text": "  book a room \n" }))
            }
        }),
    );
    let base = serve(app).await;

    let stt = OpenAiStt::new(base, "sk-test", "whisper-1").unwrap();
    let text = stt.transcribe(&utterance(), "en-US").await.unwrap();
    assert_eq!(text, "book a room");

    let (auth, body) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(auth, "Bearer sk-test");
    let body = String::from_utf8_lossy(&body);
    assert!(body.contains("RIFF"), "multipart body should carry a WAV file");
    assert!(body.contains("whisper-1"));
    assert!(body.contains("name=\"language\"\r\n\r\nen"));
}

#[tokio::test]
async fn stt_error_status_becomes_stt_error() {
    let app = Router::new().route(
        "/v1/audio/transcriptions",
        post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
    );
    let stt = OpenAiStt::new(serve(app).await, "nope", "whisper-1").unwrap();
    match stt.transcribe(&utterance(), "en-US").await {
        Err(VoiceError::Stt(msg)) => assert!(msg.contains("401"), "{}", msg),
        other => panic!("expected Stt error, got {:?}", other),
    }
}

#[tokio::test]
async fn tts_sends_voice_and_speed() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::default();
    let seen_in_handler = Arc::clone(&seen);
    let app = Router::new().route(
        "/v1/audio/speech",
        post(move |Json(body): Json<Value>| {
            let seen = Arc::clone(&seen_in_handler);
            async move {
                *seen.lock().unwrap() = Some(body);
                vec![1u8, 2, 3]
            }
        }),
    );
    let tts = OpenAiTts::new(serve(app).await, "sk-test", "tts-1").unwrap();
    let config = VoiceConfig {
        rate: 1.5,
        voice: Some("nova".into()),
        ..Default::default()
    };
    let audio = tts.synthesize("Your appointment is booked.", &config).await.unwrap();
    assert_eq!(audio, vec![1, 2, 3]);

    let body = seen.lock().unwrap().clone().unwrap();
    assert_eq!(body["input"], "Your appointment is booked.");
    assert_eq!(body["voice"], "nova");
    assert_eq!(body["model"], "tts-1");
    assert_eq!(body["speed"], 1.5);
}

#[tokio::test]
async fn adapter_round_trip_with_placeholders() {
    let synth = PlaceholderSynthesizer::new().with_hold(Duration::from_millis(20));
    let log = synth.log();
    let voice = VoiceAdapter::new(
        Arc::new(PlaceholderRecognizer::with_response("what is free tomorrow")),
        Arc::new(synth),
    )
    .with_locale("en-GB");

    assert!(voice.is_supported());
    assert_eq!(voice.locale(), "en-GB");
    assert_eq!(voice.transcribe().await.unwrap(), "what is free tomorrow");

    let config = VoiceConfig {
        pitch: 0.8,
        ..Default::default()
    };
    voice.speak("Tomorrow at 10 is free.", &config).await.unwrap();
    let spoken = log.utterances();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "Tomorrow at 10 is free.");
    assert_eq!(spoken[0].config.pitch, 0.8);
    assert!(!voice.is_speaking());
}

#[tokio::test]
async fn stop_speaking_interrupts_and_next_utterance_plays() {
    let synth = PlaceholderSynthesizer::new().with_hold(Duration::from_secs(30));
    let log = synth.log();
    let voice = Arc::new(VoiceAdapter::new(
        Arc::new(PlaceholderRecognizer::unsupported()),
        Arc::new(synth),
    ));

    let pending = {
        let voice = Arc::clone(&voice);
        tokio::spawn(async move { voice.speak("long reply", &VoiceConfig::default()).await })
    };
    while !voice.is_speaking() {
        tokio::task::yield_now().await;
    }
    voice.stop_speaking();
    assert_eq!(pending.await.unwrap(), Err(VoiceError::Interrupted));
    voice.stop_speaking();

    let disabled = VoiceConfig {
        enabled: false,
        ..Default::default()
    };
    assert_eq!(voice.speak("muted", &disabled).await, Ok(()));
    assert_eq!(log.utterances().len(), 1);
}
