//! Error taxonomy shared across the session, capture, and dispatch layers.
//!
//! Every variant is recoverable: the session machine converts failures into
//! the caller's `on_error` handler and returns to `Idle`, so nothing here is
//! fatal to the process.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The OS refused microphone access.
    #[error("microphone access denied: {0}")]
    Permission(String),

    /// No usable input device, or the device failed while opening a stream.
    #[error("audio device error: {0}")]
    Device(String),

    /// No API credential configured. Raised before any device or network
    /// access is attempted.
    #[error("no API key configured")]
    MissingCredential,

    /// A stop produced a zero-length recording; nothing to dispatch.
    #[error("recording produced no audio")]
    EmptyAudio,

    /// The transcription request never got a response (DNS, connect, TLS,
    /// mid-body transport failures).
    #[error("network error: {0}")]
    Network(String),

    /// The transcription service answered, but not with a transcript.
    #[error("transcription failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Service {
        status: Option<u16>,
        message: String,
    },

    /// History or settings persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl Error {
    /// Whether this error was raised by input validation, before any
    /// device or network side effect occurred.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::MissingCredential | Error::EmptyAudio)
    }
}
