//! Voice-output settings shared by the session store and the playback path.

use serde::{Deserialize, Serialize};

/// Allowed playback rate range (the settings panel slider bounds).
pub const RATE_RANGE: (f32, f32) = (0.5, 2.0);
/// Allowed pitch range.
pub const PITCH_RANGE: (f32, f32) = (0.0, 2.0);
/// Allowed volume range.
pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);

fn default_true() -> bool {
    true
}

fn default_unit() -> f32 {
    1.0
}

/// How replies are spoken. `enabled = false` turns `speak()` into a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_unit")]
    pub rate: f32,
    #[serde(default = "default_unit")]
    pub pitch: f32,
    #[serde(default = "default_unit")]
    pub volume: f32,
    /// Named voice (e.g. "nova"). `None` lets the backend choose.
    #[serde(default)]
    pub voice: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        }
    }
}

impl VoiceConfig {
    /// Merge a partial update; fields absent from the patch are retained.
    pub fn apply(&mut self, patch: VoiceConfigPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(rate) = patch.rate {
            self.rate = rate;
        }
        if let Some(pitch) = patch.pitch {
            self.pitch = pitch;
        }
        if let Some(volume) = patch.volume {
            self.volume = volume;
        }
        if let Some(voice) = patch.voice {
            self.voice = voice;
        }
    }

    /// Copy with rate, pitch and volume clamped to the supported ranges.
    pub fn clamped(&self) -> Self {
        Self {
            enabled: self.enabled,
            rate: self.rate.clamp(RATE_RANGE.0, RATE_RANGE.1),
            pitch: self.pitch.clamp(PITCH_RANGE.0, PITCH_RANGE.1),
            volume: self.volume.clamp(VOLUME_RANGE.0, VOLUME_RANGE.1),
            voice: self.voice.clone(),
        }
    }
}

/// Partial voice-config update. `voice: Some(None)` clears the selected voice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceConfigPatch {
    pub enabled: Option<bool>,
    pub rate: Option<f32>,
    pub pitch: Option<f32>,
    pub volume: Option<f32>,
    pub voice: Option<Option<String>>,
}

impl VoiceConfigPatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    pub fn rate(rate: f32) -> Self {
        Self {
            rate: Some(rate),
            ..Default::default()
        }
    }

    pub fn pitch(pitch: f32) -> Self {
        Self {
            pitch: Some(pitch),
            ..Default::default()
        }
    }

    pub fn volume(volume: f32) -> Self {
        Self {
            volume: Some(volume),
            ..Default::default()
        }
    }

    pub fn voice(voice: Option<String>) -> Self {
        Self {
            voice: Some(voice),
            ..Default::default()
        }
    }
}

/// A voice a synthesizer can speak with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceIdentity {
    pub name: String,
    /// BCP-47 language tag, e.g. "en-US".
    pub lang: String,
}

impl VoiceIdentity {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }

    /// True when this voice speaks the primary language of `locale` ("en" for "en-US").
    pub fn matches_locale(&self, locale: &str) -> bool {
        let primary = locale.split(['-', '_']).next().unwrap_or(locale);
        self.lang
            .to_ascii_lowercase()
            .starts_with(&primary.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_rate_update_keeps_other_fields() {
        let mut config = VoiceConfig {
            enabled: false,
            rate: 1.0,
            pitch: 1.4,
            volume: 0.3,
            voice: Some("nova".into()),
        };
        config.apply(VoiceConfigPatch::rate(1.7));
        assert_eq!(config.rate, 1.7);
        assert_eq!(config.pitch, 1.4);
        assert_eq!(config.volume, 0.3);
        assert!(!config.enabled);
        assert_eq!(config.voice.as_deref(), Some("nova"));
    }

    #[test]
    fn voice_patch_can_clear_selection() {
        let mut config = VoiceConfig {
            voice: Some("onyx".into()),
            ..Default::default()
        };
        config.apply(VoiceConfigPatch::voice(None));
        assert!(config.voice.is_none());
        config.apply(VoiceConfigPatch::default());
        assert!(config.voice.is_none());
    }

    #[test]
    fn clamped_respects_slider_bounds() {
        let config = VoiceConfig {
            rate: 5.0,
            pitch: -1.0,
            volume: 1.5,
            ..Default::default()
        }
        .clamped();
        assert_eq!(config.rate, 2.0);
        assert_eq!(config.pitch, 0.0);
        assert_eq!(config.volume, 1.0);
    }

    #[test]
    fn locale_matching_uses_primary_language() {
        let voice = VoiceIdentity::new("nova", "en");
        assert!(voice.matches_locale("en-US"));
        assert!(voice.matches_locale("EN_gb"));
        assert!(!voice.matches_locale("fr-FR"));
    }
}
