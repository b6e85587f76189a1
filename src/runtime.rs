//! Events emitted by the voice session for the host UI.
//!
//! The controller publishes on a broadcast channel without waiting; slow
//! observers lag instead of blocking the session.

use crate::conversation::ConversationEntry;
use crate::session::messages::SessionPhase;

/// What just changed in the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new entry was appended to the conversation.
    EntryAppended(ConversationEntry),
    /// `is_listening` flipped.
    ListeningChanged { active: bool },
    /// The lifecycle phase changed.
    PhaseChanged { phase: SessionPhase },
    /// The conversation was emptied on close.
    ConversationCleared,
    /// Live partial transcript (or `None` once it is no longer current).
    InterimTranscript { text: Option<String> },
}

impl SessionEvent {
    /// Wire name used by the host bridge.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::EntryAppended(_) => "session.entry_appended",
            Self::ListeningChanged { .. } => "session.listening_changed",
            Self::PhaseChanged { .. } => "session.phase_changed",
            Self::ConversationCleared => "session.conversation_cleared",
            Self::InterimTranscript { .. } => "session.interim_transcript",
        }
    }

    /// JSON payload used by the host bridge.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::EntryAppended(entry) => serde_json::json!({
                "speaker": entry.speaker(),
                "text": entry.text(),
                "at": entry.at(),
            }),
            Self::ListeningChanged { active } => serde_json::json!({ "active": active }),
            Self::PhaseChanged { phase } => serde_json::json!({ "phase": phase }),
            Self::ConversationCleared => serde_json::json!({}),
            Self::InterimTranscript { text } => serde_json::json!({ "text": text }),
        }
    }
}
