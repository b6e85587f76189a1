//! Configuration types for the voice session.

use crate::error::{Result, VoiceError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder that reply templates interpolate the user's utterance into.
pub const UTTERANCE_PLACEHOLDER: &str = "{utterance}";

/// Top-level configuration for the voice session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Session-level behaviour (greeting).
    pub session: SessionConfig,
    /// Settings handed to the platform speech recognizer.
    pub capture: CaptureConfig,
    /// Voice settings for the platform speech synthesizer.
    pub speech: SpeechConfig,
    /// Canned reply templates.
    pub responses: ResponseConfig,
    /// Host bridge settings.
    pub host: HostConfig,
}

/// Session-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Spoken and logged once per open period.
    pub greeting: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello! I'm NOVA, your AI assistant. How can I help you today?".to_owned(),
        }
    }
}

/// Speech recognizer settings.
///
/// These are forwarded to the platform recognizer. The controller never
/// relies on them: listening state is derived from capture events only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// BCP-47 recognition language.
    pub language: String,
    /// Keep listening across multiple utterances.
    pub continuous: bool,
    /// Deliver partial transcripts while the user is still speaking.
    pub interim_results: bool,
    /// Number of alternatives the recognizer should return per result.
    pub max_alternatives: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            continuous: false,
            interim_results: false,
            max_alternatives: 1,
        }
    }
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP-47 synthesis language.
    pub language: String,
    /// Speaking rate multiplier.
    pub rate: f32,
    /// Voice pitch multiplier.
    pub pitch: f32,
    /// Output volume in `[0, 1]`.
    pub volume: f32,
    /// Delay between cancelling the previous utterance and starting the next.
    ///
    /// Some synthesizers drop a `speak` issued in the same tick as `cancel`.
    pub settle_delay_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            rate: 0.85,
            pitch: 1.1,
            volume: 0.9,
            settle_delay_ms: 200,
        }
    }
}

/// Canned reply configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Reply templates; each must contain [`UTTERANCE_PLACEHOLDER`].
    pub templates: Vec<String>,
    /// Reply used when the final transcript is blank.
    pub apology: String,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            templates: vec![
                "I heard you say \"{utterance}\". How can I assist you further?".to_owned(),
                "You said \"{utterance}\". What would you like to know about that?".to_owned(),
                "Thanks for saying \"{utterance}\". I'm here to help with any questions!"
                    .to_owned(),
                "You mentioned \"{utterance}\". How can I help you with this?".to_owned(),
                "I understand \"{utterance}\". What else can I do for you?".to_owned(),
            ],
            apology: "I didn't catch that. Please try speaking again.".to_owned(),
        }
    }
}

/// Host bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Whether the host exposes a speech recognizer.
    pub capture_supported: bool,
    /// Command request channel capacity.
    pub request_capacity: usize,
    /// Event broadcast channel capacity.
    pub event_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            capture_supported: true,
            request_capacity: 64,
            event_capacity: 128,
        }
    }
}

impl VoiceConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| VoiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VoiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/nova/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("nova").join("config.toml")
        } else {
            dirs::config_dir()
                .map(|d| d.join("nova").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("/tmp/nova-config/config.toml"))
        }
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.session.greeting.trim().is_empty() {
            return Err(VoiceError::Config("session.greeting cannot be blank".into()));
        }
        if self.responses.apology.trim().is_empty() {
            return Err(VoiceError::Config("responses.apology cannot be blank".into()));
        }
        if self.responses.templates.is_empty() {
            return Err(VoiceError::Config(
                "responses.templates must contain at least one template".into(),
            ));
        }
        if let Some(bad) = self
            .responses
            .templates
            .iter()
            .find(|t| !t.contains(UTTERANCE_PLACEHOLDER))
        {
            return Err(VoiceError::Config(format!(
                "response template {bad:?} is missing the {UTTERANCE_PLACEHOLDER} placeholder"
            )));
        }
        if self.speech.rate <= 0.0 {
            return Err(VoiceError::Config("speech.rate must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.speech.volume) {
            return Err(VoiceError::Config("speech.volume must be within [0, 1]".into()));
        }
        Ok(())
    }
}
