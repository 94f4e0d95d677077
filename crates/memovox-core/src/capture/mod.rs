//! Microphone capture behind a start/pause/resume/stop/cancel contract.
//!
//! The [`Recorder`] owns the chunk buffer and the lifecycle; the
//! [`CaptureBackend`] trait owns the device. Any platform binding (cpal,
//! or a mock in tests) implements the same five operations, so the session
//! machine never touches audio APIs directly.

mod cpal_backend;

pub use cpal_backend::{list_input_devices, CpalBackend, InputDeviceInfo};

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// A finalized recording, ready to hand to the transcription dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
}

/// Write end of the chunk buffer, handed to the backend on `open()`.
///
/// Backends push encoded chunks from their capture callback; the recorder
/// keeps the read end. Cloneable so it can cross into an audio thread.
#[derive(Clone)]
pub struct ChunkSink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ChunkSink {
    /// Append one encoded chunk. Empty chunks are ignored.
    pub fn push(&self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.push(chunk);
        }
    }
}

/// Platform capture contract.
///
/// `open` acquires the device and starts delivering chunks into the sink;
/// `pause`/`resume` gate delivery without releasing the device; `close`
/// flushes any tail data and releases the device; `abort` releases the
/// device without flushing. `finalize` wraps the concatenated chunks into
/// the backend's container format.
pub trait CaptureBackend {
    fn open(&mut self, sink: ChunkSink) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn close(&mut self) -> Result<()>;
    fn abort(&mut self);
    fn finalize(&self, data: Vec<u8>) -> Result<AudioPayload>;
}

/// Owns one recording cycle's buffer and drives a [`CaptureBackend`].
pub struct Recorder<B: CaptureBackend> {
    backend: B,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    active: bool,
}

impl<B: CaptureBackend> Recorder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            chunks: Arc::new(Mutex::new(Vec::new())),
            active: false,
        }
    }

    /// Acquire the device and begin buffering. The previous cycle's buffer
    /// is cleared first.
    pub fn start(&mut self) -> Result<()> {
        if self.active {
            return Err(Error::Device("capture already active".into()));
        }
        self.clear();
        let sink = ChunkSink {
            chunks: Arc::clone(&self.chunks),
        };
        self.backend.open(sink)?;
        self.active = true;
        Ok(())
    }

    /// Suspend chunk delivery, keeping the device open.
    pub fn pause(&mut self) {
        if self.active {
            self.backend.pause();
        }
    }

    /// Resume chunk delivery after a pause.
    pub fn resume(&mut self) {
        if self.active {
            self.backend.resume();
        }
    }

    /// Flush, release the device, and return the concatenated payload.
    ///
    /// The device is released even when the flush fails. A cycle that
    /// buffered nothing yields `EmptyAudio` rather than an empty container.
    pub fn finish(&mut self) -> Result<AudioPayload> {
        self.active = false;
        let closed = self.backend.close();
        let data = self.take_concatenated();
        closed?;
        if data.is_empty() {
            return Err(Error::EmptyAudio);
        }
        self.backend.finalize(data)
    }

    /// Release the device and discard everything buffered so far.
    pub fn abort(&mut self) {
        self.active = false;
        self.backend.abort();
        self.clear();
    }

    /// Total bytes buffered so far (diagnostic).
    pub fn buffered_bytes(&self) -> usize {
        self.chunks
            .lock()
            .map(|c| c.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }

    fn take_concatenated(&mut self) -> Vec<u8> {
        let mut chunks = match self.chunks.lock() {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        let mut data = Vec::with_capacity(chunks.iter().map(Vec::len).sum());
        for chunk in chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        data
    }

    fn clear(&mut self) {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.clear();
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scripted capture backend for session and recorder tests.
    ///
    /// All state is shared behind `Arc`s so tests can keep a clone while the
    /// recorder owns the original, and `feed()` chunks as if the platform
    /// callback fired. The pause gate behaves the way a real callback would.
    #[derive(Clone)]
    pub struct MockBackend {
        pub opens: Arc<AtomicUsize>,
        pub closes: Arc<AtomicUsize>,
        pub aborts: Arc<AtomicUsize>,
        paused: Arc<AtomicBool>,
        sink: Arc<Mutex<Option<ChunkSink>>>,
        fail_open: Arc<Mutex<Option<Error>>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self {
                opens: Arc::new(AtomicUsize::new(0)),
                closes: Arc::new(AtomicUsize::new(0)),
                aborts: Arc::new(AtomicUsize::new(0)),
                paused: Arc::new(AtomicBool::new(false)),
                sink: Arc::new(Mutex::new(None)),
                fail_open: Arc::new(Mutex::new(None)),
            }
        }

        pub fn failing_open(error: Error) -> Self {
            let backend = Self::new();
            *backend.fail_open.lock().unwrap() = Some(error);
            backend
        }

        /// Simulate the platform delivering one chunk of encoded audio.
        pub fn feed(&self, chunk: &[u8]) {
            if self.paused.load(Ordering::SeqCst) {
                return;
            }
            if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                sink.push(chunk.to_vec());
            }
        }
    }

    impl CaptureBackend for MockBackend {
        fn open(&mut self, sink: ChunkSink) -> Result<()> {
            if let Some(err) = self.fail_open.lock().unwrap().take() {
                return Err(err);
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.paused.store(false, Ordering::SeqCst);
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        fn pause(&mut self) {
            self.paused.store(true, Ordering::SeqCst);
        }

        fn resume(&mut self) {
            self.paused.store(false, Ordering::SeqCst);
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock().unwrap() = None;
            Ok(())
        }

        fn abort(&mut self) {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock().unwrap() = None;
        }

        fn finalize(&self, data: Vec<u8>) -> Result<AudioPayload> {
            Ok(AudioPayload {
                bytes: data,
                mime_type: "application/octet-stream",
                file_name: "recording.bin".into(),
            })
        }
    }
}
