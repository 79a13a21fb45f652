//! REPL input parsing. Lines starting with `/` are commands; anything else is said to the assistant.

use chrono::NaiveDate;
use concierge_voice::settings::{PITCH_RANGE, RATE_RANGE, VOLUME_RANGE};
use thiserror::Error;

/// Default slot length for `/availability` when no minutes are given.
pub const DEFAULT_SLOT_MINUTES: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Say(String),
    Listen,
    Stop,
    Clear,
    Status,
    SetVoiceEnabled(bool),
    Rate(f32),
    Pitch(f32),
    Volume(f32),
    /// `None` returns to the backend's default voice.
    UseVoice(Option<String>),
    Voices,
    Appointments,
    Availability { date: NaiveDate, minutes: u32 },
    Cancel(String),
    Config,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),
    #[error("/{command} needs {what}")]
    Missing {
        command: &'static str,
        what: &'static str,
    },
    #[error("/{command}: {detail}")]
    Invalid {
        command: &'static str,
        detail: String,
    },
}

pub const HELP: &str = "\
Type a message and press Enter to talk to the assistant.

  /voice                 speak one message (microphone)
  /stop                  stop listening and stop the current reply
  /voice on|off          spoken replies on or off
  /rate <0.5-2>          speech rate
  /pitch <0-2>           speech pitch
  /volume <0-1>          speech volume
  /use-voice [name]      pick a voice (no name: default)
  /voices                list voices for the current locale
  /appointments          upcoming appointments (next 7 days)
  /availability YYYY-MM-DD [minutes]
                         free slots on a day
  /cancel <id>           cancel an appointment
  /status                session status and voice settings
  /clear                 clear the conversation
  /config                print the effective configuration
  /help                  this help
  /quit                  exit";

fn number(command: &'static str, raw: Option<&str>, range: (f32, f32)) -> Result<f32, ParseError> {
    let raw = raw.ok_or(ParseError::Missing {
        command,
        what: "a number",
    })?;
    let value: f32 = raw.parse().map_err(|_| ParseError::Invalid {
        command,
        detail: format!("{:?} is not a number", raw),
    })?;
    Ok(value.clamp(range.0, range.1))
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Command::Say(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next();

    let command = match name.as_str() {
        "voice" => match arg.map(str::to_ascii_lowercase).as_deref() {
            None => Command::Listen,
            Some("on") => Command::SetVoiceEnabled(true),
            Some("off") => Command::SetVoiceEnabled(false),
            Some(other) => {
                return Err(ParseError::Invalid {
                    command: "voice",
                    detail: format!("expected on or off, got {:?}", other),
                })
            }
        },
        "stop" => Command::Stop,
        "clear" => Command::Clear,
        "status" => Command::Status,
        "rate" => Command::Rate(number("rate", arg, RATE_RANGE)?),
        "pitch" => Command::Pitch(number("pitch", arg, PITCH_RANGE)?),
        "volume" => Command::Volume(number("volume", arg, VOLUME_RANGE)?),
        "use-voice" => {
            let name: Vec<&str> = arg.into_iter().chain(parts.by_ref()).collect();
            if name.is_empty() {
                Command::UseVoice(None)
            } else {
                Command::UseVoice(Some(name.join(" ")))
            }
        }
        "voices" => Command::Voices,
        "appointments" => Command::Appointments,
        "availability" => {
            let raw = arg.ok_or(ParseError::Missing {
                command: "availability",
                what: "a date (YYYY-MM-DD)",
            })?;
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                ParseError::Invalid {
                    command: "availability",
                    detail: format!("{:?} is not a YYYY-MM-DD date", raw),
                }
            })?;
            let minutes = match parts.next() {
                None => DEFAULT_SLOT_MINUTES,
                Some(m) => match m.parse::<u32>() {
                    Ok(minutes) if minutes > 0 => minutes,
                    _ => {
                        return Err(ParseError::Invalid {
                            command: "availability",
                            detail: format!("{:?} is not a positive number of minutes", m),
                        })
                    }
                },
            };
            Command::Availability { date, minutes }
        }
        "cancel" => Command::Cancel(
            arg.ok_or(ParseError::Missing {
                command: "cancel",
                what: "an appointment id",
            })?
            .to_string(),
        ),
        "config" => Command::Config,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(command)
}
