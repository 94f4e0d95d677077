pub mod capture;
#[cfg(feature = "clipboard")]
pub mod clipboard;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod session;
pub mod settings;
pub mod verbose;

pub use capture::{
    list_input_devices, AudioPayload, CaptureBackend, ChunkSink, CpalBackend, InputDeviceInfo,
    Recorder,
};
#[cfg(feature = "clipboard")]
pub use clipboard::copy_to_clipboard;
pub use dispatch::{
    HttpDispatcher, TranscriptionBackend, TranscriptionRequest, TranscriptionResult,
};
pub use error::{Error, Result};
pub use history::{HistoryRecord, HistoryStore, MAX_RECORDS, MIN_WORDS};
pub use session::{SessionController, SessionHandlers, SessionState};
pub use settings::Settings;
pub use verbose::set_verbose;
