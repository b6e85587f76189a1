//! Error types for the voice session core.

/// Top-level error type for the voice interaction session.
///
/// Adapter failures that happen while a session is open are converted into
/// assistant messages by the controller; this type is only surfaced at the
/// edges (configuration, adapter start-up, host plumbing).
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The platform has no speech capture capability.
    #[error("speech recognition is not supported on this platform")]
    UnsupportedPlatform,

    /// Microphone access was refused by the user or the OS.
    #[error("microphone permission denied")]
    PermissionDenied,

    /// Speech capture (speech-to-text) error.
    #[error("capture error: {0}")]
    Capture(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Session coordination error.
    #[error("session error: {0}")]
    Session(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VoiceError>;
