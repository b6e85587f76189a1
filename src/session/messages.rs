//! Inputs to and views of the voice session.

use crate::conversation::ConversationEntry;
use crate::permissions::PermissionOutcome;
use crate::stt::CaptureEvent;
use serde::Serialize;
use tokio::sync::oneshot;

/// Everything the session reacts to, in arrival order.
#[derive(Debug)]
pub enum SessionInput {
    /// Host UI opened the session.
    Open,
    /// Host UI closed the session.
    Close,
    /// Host UI pressed the microphone control.
    ToggleListening,
    /// Capture adapter event.
    Capture(CaptureEvent),
    /// Answer to a permission request issued with `ticket`.
    PermissionResolved {
        ticket: u64,
        outcome: PermissionOutcome,
    },
    /// Request a copy of the current state.
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Closed,
    /// Open and not listening.
    Idle,
    /// Waiting for the platform permission prompt.
    AwaitingPermission,
    /// `capture.start()` issued, waiting for the stream to start.
    Starting,
    /// Capture stream active.
    Listening,
}

impl SessionPhase {
    #[must_use]
    pub fn is_open(self) -> bool {
        self != Self::Closed
    }
}

/// Text the host shows under the microphone control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLine {
    pub headline: String,
    pub hint: String,
}

impl StatusLine {
    #[must_use]
    pub fn derive(is_supported: bool, permission_granted: bool, is_listening: bool) -> Self {
        let headline = if !is_supported {
            "Speech recognition not supported"
        } else if !permission_granted && !is_listening {
            "Click to enable microphone"
        } else if is_listening {
            "Click to stop listening"
        } else {
            "Tap to speak"
        };
        let hint = if is_supported {
            "Works best in Chrome and Edge browsers"
        } else {
            "Please use Chrome or Edge for voice features"
        };
        Self {
            headline: headline.to_owned(),
            hint: hint.to_owned(),
        }
    }
}

/// Point-in-time copy of the session state for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub is_open: bool,
    pub is_listening: bool,
    pub permission_granted: bool,
    pub is_supported: bool,
    pub has_greeted: bool,
    pub phase: SessionPhase,
    pub conversation: Vec<ConversationEntry>,
    pub interim_transcript: Option<String>,
    pub status: StatusLine,
}
