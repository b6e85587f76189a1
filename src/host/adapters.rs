//! Session adapters backed by a host shell.
//!
//! The recognizer, synthesizer and permission prompt live in the host (a
//! browser page or native app). These adapters turn adapter calls into
//! outgoing events; the host's answers come back as commands routed by
//! [`HostCommandServer`](crate::host::channel::HostCommandServer).

use crate::config::{CaptureConfig, VoiceConfig};
use crate::error::{Result, VoiceError};
use crate::host::contract::EventEnvelope;
use crate::permissions::PermissionBroker;
use crate::responder::TemplateResponder;
use crate::session::controller::SessionAdapters;
use crate::session::runtime::{SessionHandle, SessionRuntime, session_channel};
use crate::stt::SpeechCapture;
use crate::tts::{SettledSpeaker, SpeechSynthesizer, Utterance};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Publishes event envelopes to the host.
#[derive(Debug, Clone)]
pub struct HostEvents {
    tx: broadcast::Sender<EventEnvelope>,
}

impl HostEvents {
    #[must_use]
    pub fn new(tx: broadcast::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: &str, payload: serde_json::Value) {
        if self.tx.send(EventEnvelope::fresh(event, payload)).is_err() {
            debug!(event, "no host event subscribers");
        }
    }
}

/// Capture adapter that asks the host's recognizer to start and stop.
pub struct HostCapture {
    events: HostEvents,
    config: CaptureConfig,
    supported: bool,
    active: bool,
}

impl HostCapture {
    #[must_use]
    pub fn new(events: HostEvents, config: CaptureConfig, supported: bool) -> Self {
        Self {
            events,
            config,
            supported,
            active: false,
        }
    }
}

impl SpeechCapture for HostCapture {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&mut self) -> Result<()> {
        if !self.supported {
            return Err(VoiceError::UnsupportedPlatform);
        }
        self.events.emit(
            "capture.start",
            serde_json::json!({
                "language": self.config.language,
                "continuous": self.config.continuous,
                "interim_results": self.config.interim_results,
                "max_alternatives": self.config.max_alternatives,
            }),
        );
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            self.events.emit("capture.stop", serde_json::json!({}));
            self.active = false;
        }
    }
}

/// Synthesizer that forwards speech requests to the host.
#[derive(Debug, Clone)]
pub struct HostSynthesizer {
    events: HostEvents,
}

impl HostSynthesizer {
    #[must_use]
    pub fn new(events: HostEvents) -> Self {
        Self { events }
    }
}

impl SpeechSynthesizer for HostSynthesizer {
    fn cancel(&self) {
        self.events.emit("speech.cancel", serde_json::json!({}));
    }

    fn utter(&self, utterance: &Utterance) {
        let payload = serde_json::to_value(utterance).unwrap_or_else(|e| {
            debug!(error = %e, "utterance serialization failed; sending text only");
            serde_json::json!({ "text": utterance.text })
        });
        self.events.emit("speech.speak", payload);
    }
}

/// A session wired to a host shell.
pub struct HostSession {
    pub handle: SessionHandle,
    pub runtime: SessionRuntime,
    pub permissions: PermissionBroker,
}

/// Build a session whose platform adapters all talk to the host through
/// `event_tx`.
///
/// # Errors
///
/// Returns [`VoiceError::Config`] if the configuration is invalid.
pub fn build_host_session(
    config: &VoiceConfig,
    event_tx: broadcast::Sender<EventEnvelope>,
) -> Result<HostSession> {
    config.validate()?;
    let events = HostEvents::new(event_tx);

    let permission_events = events.clone();
    let permissions = PermissionBroker::new(move |request_id| {
        permission_events.emit(
            "permission.requested",
            serde_json::json!({ "id": request_id, "kind": "microphone" }),
        );
    });

    let (handle, mailbox) = session_channel(config.host.event_capacity);
    let adapters = SessionAdapters {
        capture: Box::new(HostCapture::new(
            events.clone(),
            config.capture.clone(),
            config.host.capture_supported,
        )),
        output: Arc::new(SettledSpeaker::new(
            HostSynthesizer::new(events),
            config.speech.clone(),
        )),
        responder: Box::new(TemplateResponder::from_config(&config.responses)?),
        permission: Arc::new(permissions.clone()),
    };
    let runtime = SessionRuntime::new(config, adapters, &handle, mailbox);

    Ok(HostSession {
        handle,
        runtime,
        permissions,
    })
}
