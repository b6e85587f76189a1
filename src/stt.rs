//! Speech capture adapter: the seam over platform speech-to-text.
//!
//! Concrete recognizers implement [`SpeechCapture`] and report what happens
//! on the capture stream through a [`CaptureEventSink`]. The session
//! controller never infers listening state on its own; it only reacts to
//! the events delivered here, so continuous and single-shot recognizers
//! both work unchanged.

use crate::error::Result;
use crate::session::messages::SessionInput;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// Failure categories reported by a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureErrorKind {
    /// Microphone access was refused.
    NotAllowed,
    /// The recognizer heard no speech before timing out.
    NoSpeech,
    /// No usable microphone, or the audio device failed.
    AudioCaptureFailure,
    /// The recognizer's backing service could not be reached.
    NetworkFailure,
    /// Capture was aborted.
    Aborted,
    Other,
}

impl CaptureErrorKind {
    /// Map a platform recognizer error code onto a kind.
    ///
    /// Unknown codes map to [`CaptureErrorKind::Other`].
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "not-allowed" | "not_allowed" | "service-not-allowed" => Self::NotAllowed,
            "no-speech" | "no_speech" => Self::NoSpeech,
            "audio-capture" | "audio_capture" => Self::AudioCaptureFailure,
            "network" => Self::NetworkFailure,
            "aborted" => Self::Aborted,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAllowed => "not_allowed",
            Self::NoSpeech => "no_speech",
            Self::AudioCaptureFailure => "audio_capture_failure",
            Self::NetworkFailure => "network_failure",
            Self::Aborted => "aborted",
            Self::Other => "other",
        }
    }

    /// Human-readable cause, phrased as advice to the user.
    #[must_use]
    pub fn user_hint(self) -> &'static str {
        match self {
            Self::NotAllowed => "Please allow microphone access and try again.",
            Self::NoSpeech => "No speech was detected. Please try speaking louder.",
            Self::AudioCaptureFailure => "No microphone was found. Please check your microphone.",
            Self::NetworkFailure => "Network error occurred. Please check your connection.",
            Self::Aborted => "Speech recognition was stopped.",
            Self::Other => "Please try again.",
        }
    }
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened on the capture stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// The recognizer began capturing audio.
    Started,
    /// A recognized chunk. Only final chunks may trigger a reply.
    Result { transcript: String, is_final: bool },
    /// Capture failed; the stream is over.
    Error(CaptureErrorKind),
    /// The stream terminated on its own (e.g. silence timeout).
    Ended,
}

/// Platform speech-to-text capability.
///
/// `start` and `stop` are requests; confirmation arrives asynchronously as
/// [`CaptureEvent`]s through the sink the implementation was built with.
pub trait SpeechCapture: Send {
    /// Whether the platform exposes speech capture at all.
    ///
    /// Probed once when the controller is constructed.
    fn is_supported(&self) -> bool;

    /// Begin capture.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::UnsupportedPlatform`](crate::VoiceError::UnsupportedPlatform)
    /// when there is no recognizer, [`VoiceError::PermissionDenied`](crate::VoiceError::PermissionDenied)
    /// if access is refused up front, or another error if the request could
    /// not be issued. Access revoked after start arrives as
    /// [`CaptureEvent::Error`] instead.
    fn start(&mut self) -> Result<()>;

    /// End capture. Must be a no-op when not capturing.
    fn stop(&mut self);
}

/// Delivers capture events into the session's event queue.
///
/// Cloneable and non-blocking, so it can be called from recognizer
/// callbacks on any thread.
#[derive(Debug, Clone)]
pub struct CaptureEventSink {
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl CaptureEventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { tx }
    }

    /// Queue an event. Events sent after the session runtime has shut down
    /// are dropped.
    pub fn emit(&self, event: CaptureEvent) {
        if self.tx.send(SessionInput::Capture(event)).is_err() {
            debug!("session runtime gone, dropping capture event");
        }
    }

    pub fn started(&self) {
        self.emit(CaptureEvent::Started);
    }

    pub fn result(&self, transcript: impl Into<String>, is_final: bool) {
        self.emit(CaptureEvent::Result {
            transcript: transcript.into(),
            is_final,
        });
    }

    pub fn error(&self, kind: CaptureErrorKind) {
        self.emit(CaptureEvent::Error(kind));
    }

    pub fn ended(&self) {
        self.emit(CaptureEvent::Ended);
    }
}
