//! Concierge chat: terminal client for the scheduling assistant.
//!
//! Plain lines are sent to the assistant; `/help` lists the commands. Replies are spoken when
//! built with `--features audio` and STT/TTS keys are present, otherwise voice input reports
//! itself unsupported and replies are text only.

mod commands;
mod render;

use chrono::Utc;
use commands::{Command, HELP};
use concierge_core::{
    AppointmentsClient, ChatConfig, ControllerConfig, HttpAssistantClient, Notice,
    PlaybackOutcome, SessionController, SessionStore, SkipReason, TurnOutcome, VoiceConfigPatch,
};
use concierge_voice::{
    PlaceholderRecognizer, PlaceholderSynthesizer, SpeechRecognizer, SpeechSynthesizer,
    VoiceAdapter,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Window for `/appointments`.
const UPCOMING_DAYS: i64 = 7;

#[cfg(feature = "audio")]
fn voice_backends() -> (Arc<dyn SpeechRecognizer>, Arc<dyn SpeechSynthesizer>) {
    use concierge_voice::{
        MicrophoneConfig, MicrophoneRecognizer, OpenAiStt, OpenAiTts, SpeakerSynthesizer,
    };

    let recognizer: Arc<dyn SpeechRecognizer> = match OpenAiStt::from_env() {
        Ok(stt) => Arc::new(MicrophoneRecognizer::new(
            MicrophoneConfig::default(),
            Arc::new(stt),
        )),
        Err(e) => {
            tracing::warn!(error = %e, "voice input disabled");
            Arc::new(PlaceholderRecognizer::unsupported())
        }
    };
    let synthesizer: Arc<dyn SpeechSynthesizer> =
        match OpenAiTts::from_env().and_then(|tts| SpeakerSynthesizer::new(Arc::new(tts))) {
            Ok(speaker) => Arc::new(speaker),
            Err(e) => {
                tracing::warn!(error = %e, "spoken replies disabled");
                Arc::new(PlaceholderSynthesizer::new())
            }
        };
    (recognizer, synthesizer)
}

#[cfg(not(feature = "audio"))]
fn voice_backends() -> (Arc<dyn SpeechRecognizer>, Arc<dyn SpeechSynthesizer>) {
    (
        Arc::new(PlaceholderRecognizer::unsupported()),
        Arc::new(PlaceholderSynthesizer::new()),
    )
}

fn report(outcome: TurnOutcome) {
    match outcome {
        TurnOutcome::Skipped(SkipReason::Busy) => {
            println!("(still on the last message; /stop interrupts it)")
        }
        TurnOutcome::Skipped(SkipReason::EmptyInput) => {}
        TurnOutcome::Notice(Notice::Unsupported) => {
            println!("(voice input is not available; type your message instead)")
        }
        TurnOutcome::Notice(Notice::CaptureFailed { detail }) => {
            println!("(didn't catch that: {})", detail)
        }
        TurnOutcome::Answered {
            playback: PlaybackOutcome::Failed(e),
            ..
        } => println!("(could not speak the reply: {})", e),
        TurnOutcome::Answered { .. } | TurnOutcome::Failed { .. } => {}
    }
}

struct Repl {
    controller: SessionController,
    appointments: Arc<AppointmentsClient>,
    config: ChatConfig,
}

impl Repl {
    /// Returns false when the user asked to quit.
    fn handle(&self, command: Command) -> bool {
        match command {
            Command::Say(text) => {
                let controller = self.controller.clone();
                tokio::spawn(async move { report(controller.submit_text(&text).await) });
            }
            Command::Listen => {
                let controller = self.controller.clone();
                if controller.is_voice_supported() {
                    println!("(listening...)");
                }
                tokio::spawn(async move { report(controller.start_voice_turn().await) });
            }
            Command::Stop => {
                self.controller.stop_listening();
                self.controller.stop_speaking();
            }
            Command::Clear => {
                self.controller.clear();
                println!("(conversation cleared)");
            }
            Command::Status => self.print_status(),
            Command::SetVoiceEnabled(enabled) => {
                let voice = self.controller.update_voice(VoiceConfigPatch::enabled(enabled));
                println!("(spoken replies {})", if voice.enabled { "on" } else { "off" });
            }
            Command::Rate(rate) => {
                let voice = self.controller.update_voice(VoiceConfigPatch::rate(rate));
                println!("(rate {:.2})", voice.rate);
            }
            Command::Pitch(pitch) => {
                let voice = self.controller.update_voice(VoiceConfigPatch::pitch(pitch));
                println!("(pitch {:.2})", voice.pitch);
            }
            Command::Volume(volume) => {
                let voice = self.controller.update_voice(VoiceConfigPatch::volume(volume));
                println!("(volume {:.2})", voice.volume);
            }
            Command::UseVoice(name) => {
                let known = self.controller.available_voices();
                if let Some(name) = name.as_deref() {
                    if !known.is_empty() && !known.iter().any(|v| v.name == name) {
                        println!("(unknown voice {:?}; see /voices)", name);
                        return true;
                    }
                }
                let voice = self.controller.update_voice(VoiceConfigPatch::voice(name));
                println!("(voice {})", voice.voice.as_deref().unwrap_or("default"));
            }
            Command::Voices => {
                let voices = self.controller.available_voices();
                if voices.is_empty() {
                    println!("(no voices for {})", self.config.locale);
                }
                for voice in voices {
                    println!("  {} ({})", voice.name, voice.lang);
                }
            }
            Command::Appointments => {
                let client = Arc::clone(&self.appointments);
                tokio::spawn(async move {
                    let now = Utc::now();
                    let end = now + chrono::Duration::days(UPCOMING_DAYS);
                    match client.list(Some(now), Some(end)).await {
                        Ok(list) if list.is_empty() => println!("(no upcoming appointments)"),
                        Ok(list) => {
                            for appointment in &list {
                                println!("  {}", render::format_appointment(appointment));
                            }
                        }
                        Err(e) => println!("(could not load appointments: {})", e),
                    }
                });
            }
            Command::Availability { date, minutes } => {
                let client = Arc::clone(&self.appointments);
                tokio::spawn(async move {
                    match client.check_availability(date, minutes).await {
                        Ok(slots) if slots.is_empty() => println!("(nothing free on {})", date),
                        Ok(slots) => {
                            println!("Free {}-minute slots on {}:", minutes, date);
                            for slot in &slots {
                                println!("  {}", render::format_slot(slot));
                            }
                        }
                        Err(e) => println!("(could not check availability: {})", e),
                    }
                });
            }
            Command::Cancel(id) => {
                let client = Arc::clone(&self.appointments);
                tokio::spawn(async move {
                    match client.cancel(&id).await {
                        Ok(message) => println!(
                            "({})",
                            message.unwrap_or_else(|| format!("appointment {} cancelled", id))
                        ),
                        Err(e) => println!("(could not cancel {}: {})", id, e),
                    }
                });
            }
            Command::Config => match self.config.to_toml() {
                Ok(rendered) => print!("{}", rendered),
                Err(e) => println!("(could not render config: {})", e),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
        }
        true
    }

    fn print_status(&self) {
        let voice = self.controller.store().voice();
        println!("status:  {}", self.controller.status());
        println!("server:  {}", self.config.api_base_url);
        println!(
            "voice:   input {}, replies {} (rate {:.2}, pitch {:.2}, volume {:.2}, voice {})",
            if self.controller.is_voice_supported() { "available" } else { "unavailable" },
            if voice.enabled { "on" } else { "off" },
            voice.rate,
            voice.pitch,
            voice.volume,
            voice.voice.as_deref().unwrap_or("default"),
        );
        println!("messages: {}", self.controller.snapshot().messages.len());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[concierge-chat] .env not loaded: {} (using system environment)", e);
    }

    // Logs go to stderr so they don't interleave with the transcript.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ChatConfig::load()?;
    let (recognizer, synthesizer) = voice_backends();
    let voice = VoiceAdapter::new(recognizer, synthesizer).with_locale(config.locale.clone());
    let dispatch = HttpAssistantClient::new(config.api_base_url.clone(), config.request_timeout())?;
    let appointments = AppointmentsClient::new(config.api_base_url.clone(), config.request_timeout())?;

    let store = Arc::new(SessionStore::new(config.voice.clone()));
    let controller = SessionController::new(store, Arc::new(dispatch), Arc::new(voice))
        .with_config(ControllerConfig::from(&config));

    tracing::info!(
        api_base_url = %config.api_base_url,
        voice_input = controller.is_voice_supported(),
        "Concierge chat started"
    );

    tokio::spawn(render::run(controller.subscribe()));

    match appointments.health().await {
        Ok(health) => tracing::info!(status = %health.status, "assistant server reachable"),
        Err(e) => tracing::warn!(error = %e, "assistant server health check failed"),
    }
    println!("Concierge: ask me to book, move or cancel appointments. /help for commands.");

    let repl = Repl {
        controller,
        appointments: Arc::new(appointments),
        config,
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match commands::parse(&line) {
                    Ok(command) => {
                        if !repl.handle(command) {
                            break;
                        }
                    }
                    Err(e) => println!("({})", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down chat");
                break;
            }
        }
    }

    repl.controller.stop_listening();
    repl.controller.stop_speaking();
    Ok(())
}
