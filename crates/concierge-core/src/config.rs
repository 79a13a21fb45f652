//! Chat configuration loaded from file and environment.
//!
//! Precedence (later wins): built-in defaults, the TOML file named by `CONCIERGE_CONFIG`
//! (default `config/concierge`, optional), then `CONCIERGE_*` environment variables with `__`
//! separating nested keys.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | CONCIERGE_API_BASE_URL | http://localhost:5000/api | Base URL of the assistant and appointments API. |
//! | CONCIERGE_REQUEST_TIMEOUT_SECS | 60 | Per-request HTTP timeout. |
//! | CONCIERGE_DISPATCH_TIMEOUT_SECS | unset | Upper bound on one assistant round trip. |
//! | CONCIERGE_TRANSCRIBE_TIMEOUT_SECS | unset | Upper bound on one voice capture. |
//! | CONCIERGE_LOCALE | en-US | Recognition locale. |
//! | CONCIERGE_VOICE__ENABLED / __RATE / __PITCH / __VOLUME / __VOICE | true / 1 / 1 / 1 / unset | Spoken replies. |

use crate::error::CoreResult;
use concierge_voice::{VoiceConfig, DEFAULT_LOCALE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_CONFIG_PATH: &str = "config/concierge";
const ENV_PREFIX: &str = "CONCIERGE";

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// No bound when unset; the round trip settles when the HTTP client does.
    #[serde(default)]
    pub dispatch_timeout_secs: Option<u64>,
    #[serde(default)]
    pub transcribe_timeout_secs: Option<u64>,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Initial voice settings for new sessions.
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            dispatch_timeout_secs: None,
            transcribe_timeout_secs: None,
            locale: default_locale(),
            voice: VoiceConfig::default(),
        }
    }
}

impl ChatConfig {
    /// Load from `CONCIERGE_CONFIG` (or `config/concierge`) and the process environment.
    pub fn load() -> CoreResult<Self> {
        let path =
            std::env::var("CONCIERGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_with(&path, config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an explicit file path and environment source.
    pub fn load_with(path: &str, env: config::Environment) -> CoreResult<Self> {
        let built = config::Config::builder()
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("request_timeout_secs", default_request_timeout_secs() as i64)?
            .set_default("locale", DEFAULT_LOCALE)?
            .set_default("voice.enabled", true)?
            .set_default("voice.rate", 1.0_f64)?
            .set_default("voice.pitch", 1.0_f64)?
            .set_default("voice.volume", 1.0_f64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: ChatConfig = built.try_deserialize()?;
        loaded.voice = loaded.voice.clamped();
        loaded.request_timeout_secs = loaded.request_timeout_secs.max(1);
        tracing::debug!(
            api_base_url = %loaded.api_base_url,
            locale = %loaded.locale,
            "configuration loaded"
        );
        Ok(loaded)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Zero means unbounded, same as unset.
    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn transcribe_timeout(&self) -> Option<Duration> {
        self.transcribe_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    /// The effective configuration as TOML (for `/config`).
    pub fn to_toml(&self) -> CoreResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_without_file_or_env() {
        let cfg = ChatConfig::load_with("does/not/exist", env(&[])).unwrap();
        assert_eq!(cfg, ChatConfig::default());
        assert!(cfg.dispatch_timeout().is_none());
    }

    #[test]
    fn file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concierge.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "api_base_url = \"http://file:1/api\"\nlocale = \"en-GB\"\ndispatch_timeout_secs = 20\n\n[voice]\nrate = 1.5\nvoice = \"nova\""
        )
        .unwrap();

        let cfg = ChatConfig::load_with(
            path.to_str().unwrap(),
            env(&[
                ("CONCIERGE_API_BASE_URL", "http://env:2/api"),
                ("CONCIERGE_VOICE__PITCH", "0.5"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.api_base_url, "http://env:2/api");
        assert_eq!(cfg.locale, "en-GB");
        assert_eq!(cfg.dispatch_timeout(), Some(Duration::from_secs(20)));
        assert_eq!(cfg.voice.rate, 1.5);
        assert_eq!(cfg.voice.pitch, 0.5);
        assert_eq!(cfg.voice.volume, 1.0);
        assert_eq!(cfg.voice.voice.as_deref(), Some("nova"));
    }

    #[test]
    fn voice_values_are_clamped() {
        let cfg = ChatConfig::load_with(
            "does/not/exist",
            env(&[
                ("CONCIERGE_VOICE__RATE", "9"),
                ("CONCIERGE_VOICE__VOLUME", "-1"),
                ("CONCIERGE_VOICE__ENABLED", "false"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.voice.rate, 2.0);
        assert_eq!(cfg.voice.volume, 0.0);
        assert!(!cfg.voice.enabled);
    }

    #[test]
    fn renders_as_toml() {
        let rendered = ChatConfig::default().to_toml().unwrap();
        assert!(rendered.contains("api_base_url = \"http://localhost:5000/api\""));
        assert!(rendered.contains("[voice]"));
    }
}
