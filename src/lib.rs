//! Nova: a browser-style voice conversation session.
//!
//! A session is opened and closed by its host, toggles speech capture on
//! request, transcribes what the user says, replies with a canned response,
//! and speaks every assistant message aloud.
//!
//! # Architecture
//!
//! All state lives in a single [`VoiceSessionController`] driven by one
//! async task ([`SessionRuntime`]). Everything that can happen to a session
//! arrives as a [`SessionInput`](session::messages::SessionInput) on one
//! queue:
//! - **Host actions**: open, close, toggle listening
//! - **Capture**: recognizer started, results, errors, ended ([`stt`])
//! - **Permission**: microphone prompt outcomes ([`permissions`])
//!
//! Platform services sit behind traits so the session can run against a real
//! host shell ([`host`]) or recording mocks in tests:
//! - **Capture**: [`stt::SpeechCapture`]
//! - **Speech**: [`tts::SpeechOutput`], settled by [`tts::SettledSpeaker`]
//! - **Replies**: [`responder::ResponseGenerator`]

pub mod config;
pub mod conversation;
pub mod error;
pub mod host;
pub mod permissions;
pub mod responder;
pub mod runtime;
pub mod session;
pub mod stt;
pub mod tts;

#[cfg(test)]
mod test_utils;

pub use config::VoiceConfig;
pub use conversation::{Conversation, ConversationEntry, Speaker};
pub use error::{Result, VoiceError};
pub use runtime::SessionEvent;
pub use session::controller::{SessionAdapters, VoiceSessionController};
pub use session::messages::{SessionPhase, SessionSnapshot, StatusLine};
pub use session::runtime::{SessionHandle, SessionRuntime, session_channel};
