//! Speech output adapter: one utterance at a time over platform text-to-speech.

use crate::config::SpeechConfig;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Text plus the voice settings to speak it with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    pub text: String,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    #[must_use]
    pub fn new(text: impl Into<String>, config: &SpeechConfig) -> Self {
        Self {
            text: text.into(),
            language: config.language.clone(),
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
        }
    }
}

/// What the controller needs from speech output.
///
/// Both calls are fire-and-forget and absorb failures.
pub trait SpeechOutput: Send + Sync {
    /// Cancel anything in progress, then speak `text`.
    fn speak(&self, text: &str);

    /// Stop in-progress and queued speech immediately.
    fn cancel_all(&self);
}

/// Raw platform synthesizer.
///
/// Implementations may play overlapping audio if `utter` is called twice;
/// [`SettledSpeaker`] is what enforces one utterance at a time.
pub trait SpeechSynthesizer: Send + Sync + 'static {
    fn cancel(&self);
    fn utter(&self, utterance: &Utterance);
}

/// [`SpeechOutput`] that cancels, waits a fixed settle delay, then speaks.
///
/// Every `speak` or `cancel_all` bumps a generation counter; a delayed
/// utterance only starts if no newer call arrived while it was settling,
/// so two quick `speak` calls leave only the second audible.
pub struct SettledSpeaker<S: SpeechSynthesizer> {
    synth: Arc<S>,
    config: SpeechConfig,
    generation: Arc<AtomicU64>,
}

impl<S: SpeechSynthesizer> SettledSpeaker<S> {
    #[must_use]
    pub fn new(synth: S, config: SpeechConfig) -> Self {
        Self {
            synth: Arc::new(synth),
            config,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.config.settle_delay_ms)
    }

    #[must_use]
    pub fn synthesizer(&self) -> &S {
        &self.synth
    }
}

impl<S: SpeechSynthesizer> SpeechOutput for SettledSpeaker<S> {
    fn speak(&self, text: &str) {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.synth.cancel();

        let utterance = Utterance::new(text, &self.config);
        let delay = self.settle_delay();
        let synth = Arc::clone(&self.synth);
        let generation = Arc::clone(&self.generation);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if generation.load(Ordering::SeqCst) == ticket {
                        synth.utter(&utterance);
                    } else {
                        debug!("utterance superseded before settle delay elapsed");
                    }
                });
            }
            Err(_) => {
                warn!("no async runtime for settle delay; speaking immediately");
                synth.utter(&utterance);
            }
        }
    }

    fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.synth.cancel();
    }
}
