//! Canned reply generation.
//!
//! There is no language understanding here: a reply is one of a fixed set of
//! templates with the user's words echoed back. [`ResponseGenerator`] is the
//! seam where a real assistant backend would plug in without touching the
//! session state machine.

use crate::config::{ResponseConfig, UTTERANCE_PLACEHOLDER};
use crate::error::{Result, VoiceError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Maps a user utterance to an assistant reply.
pub trait ResponseGenerator: Send {
    /// `utterance` is trimmed and never blank.
    fn respond(&mut self, utterance: &str) -> String;
}

/// Picks a template uniformly at random and interpolates the utterance.
pub struct TemplateResponder {
    templates: Vec<String>,
    rng: StdRng,
}

impl TemplateResponder {
    /// Build from configuration, seeded from OS entropy.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Config`] if there are no templates or one lacks
    /// the utterance placeholder.
    pub fn from_config(config: &ResponseConfig) -> Result<Self> {
        Self::with_rng(config.templates.clone(), StdRng::from_entropy())
    }

    /// Build with a fixed seed for reproducible selection.
    ///
    /// # Errors
    ///
    /// Same as [`TemplateResponder::from_config`].
    pub fn seeded(config: &ResponseConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config.templates.clone(), StdRng::seed_from_u64(seed))
    }

    fn with_rng(templates: Vec<String>, rng: StdRng) -> Result<Self> {
        if templates.is_empty() {
            return Err(VoiceError::Config("no reply templates configured".into()));
        }
        if let Some(bad) = templates.iter().find(|t| !t.contains(UTTERANCE_PLACEHOLDER)) {
            return Err(VoiceError::Config(format!(
                "reply template {bad:?} does not contain {UTTERANCE_PLACEHOLDER}"
            )));
        }
        Ok(Self { templates, rng })
    }

    #[must_use]
    pub fn templates(&self) -> &[String] {
        &self.templates
    }
}

impl ResponseGenerator for TemplateResponder {
    fn respond(&mut self, utterance: &str) -> String {
        // `with_rng` guarantees at least one template.
        let template = self
            .templates
            .choose(&mut self.rng)
            .map_or(UTTERANCE_PLACEHOLDER, String::as_str);
        render(template, utterance)
    }
}

/// Interpolate `utterance` into every placeholder of `template`.
#[must_use]
pub fn render(template: &str, utterance: &str) -> String {
    template.replace(UTTERANCE_PLACEHOLDER, utterance)
}
