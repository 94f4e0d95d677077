//! The recording session state machine.
//!
//! One [`SessionController`] coordinates the capture backend and the
//! transcription dispatcher through four states:
//!
//! ```text
//! Idle --start--> Recording <--pause/resume--> Paused
//!                 Recording/Paused --stop--> Processing --settle--> Idle
//!                 Recording/Paused --cancel--> Idle
//! ```
//!
//! Invalid transitions are silent no-ops, so keyboard bindings and UI
//! buttons can fire events without checking state first. Every failure is
//! recovered here and forwarded through the caller's `on_error` handler;
//! the machine always returns to `Idle` and stays usable.

use std::time::{Duration, Instant};

use crate::capture::{CaptureBackend, Recorder};
use crate::dispatch::{TranscriptionBackend, TranscriptionRequest, TranscriptionResult};
use crate::error::{Error, Result};

/// Where one record-then-transcribe cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
    Processing,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Paused => "paused",
            SessionState::Processing => "processing",
        }
    }
}

/// Caller-facing callbacks for session outcomes.
///
/// `on_result` and `on_error` fire at most once per cycle; exactly one of
/// them fires for a cycle that reached Processing, neither for a cancel.
pub struct SessionHandlers {
    on_result: Box<dyn Fn(&TranscriptionResult) + Send>,
    on_error: Box<dyn Fn(&Error) + Send>,
    on_state_change: Option<Box<dyn Fn(SessionState) + Send>>,
}

impl SessionHandlers {
    pub fn new() -> Self {
        Self {
            on_result: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
            on_state_change: None,
        }
    }

    pub fn on_result(mut self, f: impl Fn(&TranscriptionResult) + Send + 'static) -> Self {
        self.on_result = Box::new(f);
        self
    }

    pub fn on_error(mut self, f: impl Fn(&Error) + Send + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }

    pub fn on_state_change(mut self, f: impl Fn(SessionState) + Send + 'static) -> Self {
        self.on_state_change = Some(Box::new(f));
        self
    }
}

impl Default for SessionHandlers {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing bookkeeping for the active cycle.
struct Session {
    state: SessionState,
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    accumulated_pause: Duration,
}

impl Session {
    fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            started_at: None,
            paused_at: None,
            accumulated_pause: Duration::ZERO,
        }
    }

    /// Fold the pause that is currently open (if any) into the total.
    fn settle_pause(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.accumulated_pause += paused_at.elapsed();
        }
    }
}

/// Coordinates one microphone session from `start()` to `Idle`.
///
/// Generic over the capture and dispatch seams so tests can run the whole
/// machine against mocks. All operations take `&mut self`: the machine is
/// single-threaded by construction, and the suspension points (device
/// open, flush, network dispatch) are awaited sequentially, never
/// overlapped.
pub struct SessionController<B: CaptureBackend, T: TranscriptionBackend> {
    recorder: Recorder<B>,
    dispatcher: T,
    credential: Option<String>,
    language: Option<String>,
    session: Session,
    handlers: SessionHandlers,
}

impl<B: CaptureBackend, T: TranscriptionBackend> SessionController<B, T> {
    pub fn new(backend: B, dispatcher: T, handlers: SessionHandlers) -> Self {
        Self {
            recorder: Recorder::new(backend),
            dispatcher,
            credential: None,
            language: None,
            session: Session::idle(),
            handlers,
        }
    }

    /// Set the API credential for subsequent sessions. Held in memory
    /// only; never written to storage.
    pub fn set_credential(&mut self, credential: impl Into<String>) {
        self.credential = Some(credential.into());
    }

    /// Language hint forwarded with each dispatch.
    pub fn set_language(&mut self, language: Option<String>) {
        self.language = language;
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// Active recording time so far, excluding pauses.
    pub fn elapsed(&self) -> Duration {
        let Some(started_at) = self.session.started_at else {
            return Duration::ZERO;
        };
        let mut paused = self.session.accumulated_pause;
        if let Some(paused_at) = self.session.paused_at {
            paused += paused_at.elapsed();
        }
        started_at.elapsed().saturating_sub(paused)
    }

    /// Begin a new recording cycle.
    ///
    /// Fails fast with `MissingCredential` before any device access when
    /// no credential is configured; device acquisition failures surface as
    /// `Permission`/`Device`. A no-op unless the machine is `Idle`.
    pub fn start(&mut self) -> Result<()> {
        if self.session.state != SessionState::Idle {
            return Ok(());
        }
        let has_credential = self
            .credential
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        if !has_credential {
            return Err(Error::MissingCredential);
        }

        self.recorder.start()?;
        self.session = Session::idle();
        self.session.started_at = Some(Instant::now());
        self.transition(SessionState::Recording);
        Ok(())
    }

    /// Suspend buffering without releasing the microphone. A no-op unless
    /// `Recording`.
    pub fn pause(&mut self) {
        if self.session.state != SessionState::Recording {
            return;
        }
        self.recorder.pause();
        self.session.paused_at = Some(Instant::now());
        self.transition(SessionState::Paused);
    }

    /// Resume buffering after a pause. A no-op unless `Paused`.
    pub fn resume(&mut self) {
        if self.session.state != SessionState::Paused {
            return;
        }
        self.session.settle_pause();
        self.recorder.resume();
        self.transition(SessionState::Recording);
    }

    /// Finalize the buffer, release the microphone, and dispatch exactly
    /// one transcription request.
    ///
    /// Valid from both `Recording` and `Paused` (stop-from-paused is an
    /// implicit resume+stop); a no-op from any other state, which makes
    /// repeated stops while `Processing` harmless. A recording with no
    /// buffered audio is rejected before the machine enters `Processing`.
    /// The outcome is delivered through the handlers, and the machine is
    /// back at `Idle` by the time this returns.
    pub async fn stop(&mut self) {
        if !matches!(
            self.session.state,
            SessionState::Recording | SessionState::Paused
        ) {
            return;
        }
        self.session.settle_pause();

        if self.recorder.buffered_bytes() == 0 {
            self.recorder.abort();
            return self.fail(Error::EmptyAudio);
        }
        self.transition(SessionState::Processing);

        let payload = match self.recorder.finish() {
            Ok(payload) => payload,
            Err(e) => return self.fail(e),
        };

        let credential = self.credential.clone().unwrap_or_default();
        let request = TranscriptionRequest {
            payload,
            language: self.language.clone(),
        };
        match self.dispatcher.transcribe(&credential, request).await {
            Ok(result) => {
                self.reset();
                (self.handlers.on_result)(&result);
            }
            Err(e) => self.fail(e),
        }
    }

    /// Discard the buffer and release the microphone without dispatching.
    /// A no-op unless `Recording` or `Paused`; neither handler fires.
    pub fn cancel(&mut self) {
        if !matches!(
            self.session.state,
            SessionState::Recording | SessionState::Paused
        ) {
            return;
        }
        self.recorder.abort();
        self.reset();
    }

    fn fail(&mut self, error: Error) {
        crate::verbose!("session failed: {error}");
        self.reset();
        (self.handlers.on_error)(&error);
    }

    fn reset(&mut self) {
        self.session = Session::idle();
        self.transition(SessionState::Idle);
    }

    fn transition(&mut self, state: SessionState) {
        self.session.state = state;
        crate::verbose!("session state: {}", state.label());
        if let Some(notify) = &self.handlers.on_state_change {
            notify(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::test_support::MockBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    enum Reply {
        Text(&'static str),
        ServiceError(u16, &'static str),
        NetworkError(&'static str),
    }

    struct MockDispatcher {
        reply: Reply,
        calls: Arc<AtomicUsize>,
        last_payload: Arc<Mutex<Option<Vec<u8>>>>,
    }

    impl MockDispatcher {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                calls: Arc::new(AtomicUsize::new(0)),
                last_payload: Arc::new(Mutex::new(None)),
            }
        }
    }

    #[async_trait]
    impl TranscriptionBackend for MockDispatcher {
        async fn transcribe(
            &self,
            _credential: &str,
            request: TranscriptionRequest,
        ) -> Result<TranscriptionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_payload.lock().unwrap() = Some(request.payload.bytes);
            match &self.reply {
                Reply::Text(text) => Ok(TranscriptionResult {
                    text: text.to_string(),
                    language: None,
                }),
                Reply::ServiceError(status, message) => Err(Error::Service {
                    status: Some(*status),
                    message: message.to_string(),
                }),
                Reply::NetworkError(message) => Err(Error::Network(message.to_string())),
            }
        }
    }

    #[derive(Clone, Default)]
    struct Observed {
        results: Arc<Mutex<Vec<String>>>,
        errors: Arc<Mutex<Vec<String>>>,
        states: Arc<Mutex<Vec<SessionState>>>,
    }

    impl Observed {
        fn handlers(&self) -> SessionHandlers {
            let results = Arc::clone(&self.results);
            let errors = Arc::clone(&self.errors);
            let states = Arc::clone(&self.states);
            SessionHandlers::new()
                .on_result(move |r| results.lock().unwrap().push(r.text.clone()))
                .on_error(move |e| errors.lock().unwrap().push(e.to_string()))
                .on_state_change(move |s| states.lock().unwrap().push(s))
        }
    }

    fn controller(
        reply: Reply,
    ) -> (
        SessionController<MockBackend, MockDispatcher>,
        MockBackend,
        Arc<AtomicUsize>,
        Arc<Mutex<Option<Vec<u8>>>>,
        Observed,
    ) {
        let backend = MockBackend::new();
        let dispatcher = MockDispatcher::new(reply);
        let calls = Arc::clone(&dispatcher.calls);
        let payload = Arc::clone(&dispatcher.last_payload);
        let observed = Observed::default();
        let mut ctl = SessionController::new(backend.clone(), dispatcher, observed.handlers());
        ctl.set_credential("sk-test");
        (ctl, backend, calls, payload, observed)
    }

    #[tokio::test]
    async fn full_cycle_dispatches_concatenated_buffer() {
        let (mut ctl, backend, calls, payload, observed) = controller(Reply::Text("hello world"));

        ctl.start().unwrap();
        backend.feed(b"a");
        backend.feed(b"b");
        ctl.stop().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(payload.lock().unwrap().as_deref(), Some(b"ab".as_slice()));
        assert_eq!(*observed.results.lock().unwrap(), vec!["hello world"]);
        assert!(observed.errors.lock().unwrap().is_empty());
        assert_eq!(ctl.state(), SessionState::Idle);
        assert_eq!(
            *observed.states.lock().unwrap(),
            vec![
                SessionState::Recording,
                SessionState::Processing,
                SessionState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn cancel_discards_buffer_without_dispatch() {
        let (mut ctl, backend, calls, _, observed) = controller(Reply::Text("unused"));

        ctl.start().unwrap();
        backend.feed(b"audio");
        ctl.pause();
        ctl.cancel();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(observed.results.lock().unwrap().is_empty());
        assert!(observed.errors.lock().unwrap().is_empty());
        assert_eq!(backend.aborts.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn stop_from_paused_finalizes_the_buffer() {
        let (mut ctl, backend, calls, payload, _) = controller(Reply::Text("ok"));

        ctl.start().unwrap();
        backend.feed(b"before");
        ctl.pause();
        ctl.stop().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            payload.lock().unwrap().as_deref(),
            Some(b"before".as_slice())
        );
        assert_eq!(ctl.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn pause_gates_chunks_without_gap_or_duplication() {
        let (mut ctl, backend, _, payload, _) = controller(Reply::Text("ok"));

        ctl.start().unwrap();
        backend.feed(b"a");
        ctl.pause();
        backend.feed(b"dropped-while-paused");
        ctl.resume();
        backend.feed(b"b");
        ctl.stop().await;

        assert_eq!(payload.lock().unwrap().as_deref(), Some(b"ab".as_slice()));
    }

    #[tokio::test]
    async fn start_without_credential_never_touches_the_microphone() {
        let backend = MockBackend::new();
        let dispatcher = MockDispatcher::new(Reply::Text("unused"));
        let mut ctl =
            SessionController::new(backend.clone(), dispatcher, SessionHandlers::new());

        let err = ctl.start().unwrap_err();
        assert!(matches!(err, Error::MissingCredential));
        assert_eq!(backend.opens.load(Ordering::SeqCst), 0);
        assert_eq!(ctl.state(), SessionState::Idle);

        ctl.set_credential("   ");
        assert!(matches!(ctl.start(), Err(Error::MissingCredential)));
        assert_eq!(backend.opens.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn device_failure_on_start_leaves_machine_idle() {
        let backend = MockBackend::failing_open(Error::Permission("denied".into()));
        let dispatcher = MockDispatcher::new(Reply::Text("unused"));
        let mut ctl = SessionController::new(backend, dispatcher, SessionHandlers::new());
        ctl.set_credential("sk-test");

        assert!(matches!(ctl.start(), Err(Error::Permission(_))));
        assert_eq!(ctl.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn service_failure_reports_error_and_returns_to_idle() {
        let (mut ctl, backend, _, _, observed) =
            controller(Reply::ServiceError(500, "Failed to transcribe audio"));

        ctl.start().unwrap();
        backend.feed(b"audio");
        ctl.stop().await;

        let errors = observed.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].is_empty());
        assert!(errors[0].contains("500"));
        assert!(observed.results.lock().unwrap().is_empty());
        assert_eq!(ctl.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn network_failure_reports_error_and_returns_to_idle() {
        let (mut ctl, backend, _, _, observed) =
            controller(Reply::NetworkError("connection refused"));

        ctl.start().unwrap();
        backend.feed(b"audio");
        ctl.stop().await;

        assert_eq!(observed.errors.lock().unwrap().len(), 1);
        assert_eq!(ctl.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn empty_recording_is_rejected_before_dispatch() {
        let (mut ctl, _backend, calls, _, observed) = controller(Reply::Text("unused"));

        ctl.start().unwrap();
        ctl.stop().await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let errors = observed.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(ctl.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn empty_recording_never_enters_processing() {
        let (mut ctl, backend, _, _, observed) = controller(Reply::Text("unused"));

        ctl.start().unwrap();
        ctl.stop().await;

        // The microphone is released and the only states observers saw
        // are Recording then Idle.
        assert_eq!(backend.aborts.load(Ordering::SeqCst), 1);
        assert_eq!(
            *observed.states.lock().unwrap(),
            vec![SessionState::Recording, SessionState::Idle]
        );
    }

    #[tokio::test]
    async fn invalid_transitions_are_no_ops() {
        let (mut ctl, backend, calls, _, observed) = controller(Reply::Text("ok"));

        // Nothing is running yet: these must all do nothing.
        ctl.pause();
        ctl.resume();
        ctl.cancel();
        ctl.stop().await;
        assert_eq!(ctl.state(), SessionState::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(observed.states.lock().unwrap().is_empty());

        // resume() while recording must not double-count anything.
        ctl.start().unwrap();
        ctl.resume();
        assert_eq!(ctl.state(), SessionState::Recording);

        backend.feed(b"x");
        ctl.stop().await;
        // A second stop after settling is a no-op: dispatch stays at one.
        ctl.stop().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn machine_is_reusable_after_each_cycle() {
        let (mut ctl, backend, calls, payload, _) = controller(Reply::Text("ok"));

        for round in 0..3u8 {
            ctl.start().unwrap();
            backend.feed(&[round]);
            ctl.stop().await;
            assert_eq!(ctl.state(), SessionState::Idle);
            assert_eq!(payload.lock().unwrap().as_deref(), Some([round].as_slice()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn elapsed_excludes_paused_time() {
        let (mut ctl, _backend, _, _, _) = controller(Reply::Text("ok"));

        ctl.start().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        ctl.pause();
        std::thread::sleep(Duration::from_millis(100));
        ctl.resume();

        let elapsed = ctl.elapsed();
        assert!(elapsed >= Duration::from_millis(40), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(110), "elapsed {elapsed:?}");
        ctl.cancel();
        assert_eq!(ctl.elapsed(), Duration::ZERO);
    }
}
