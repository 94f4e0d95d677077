//! The interactive record loop.
//!
//! A raw-mode key thread turns terminal input into session events and the
//! main loop feeds them to the session controller. Keyboard bindings go
//! through the same four public controller methods as any other caller:
//!
//! - `Ctrl+K`  start / stop
//! - `Space`   pause / resume
//! - `Esc`     cancel
//! - `q` / `Ctrl+C`  quit (only while idle)
//!
//! Recording keeps running when the terminal loses focus; the loop just
//! prints a notice.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

use memovox_core::{
    CpalBackend, HistoryStore, HttpDispatcher, SessionController, SessionHandlers, SessionState,
    Settings, TranscriptionResult,
};

use crate::app::{format_elapsed, resolve_api_key};

#[derive(Args, Default)]
pub struct RecordArgs {
    /// Microphone device name (overrides the configured device)
    #[arg(long)]
    pub device: Option<String>,

    /// Language hint for the transcription service
    #[arg(long)]
    pub language: Option<String>,

    /// Do not copy transcripts to the clipboard
    #[arg(long)]
    pub no_copy: bool,

    /// Do not save transcripts to history
    #[arg(long)]
    pub no_history: bool,
}

/// What the key thread distilled from raw terminal events.
enum KeyAction {
    Toggle,
    PauseResume,
    Cancel,
    Quit,
    FocusLost,
    FocusGained,
}

/// Session outcomes crossing back from the controller's handlers.
enum Outcome {
    Transcript(TranscriptionResult),
    Failed(String),
}

pub async fn run(args: RecordArgs) -> Result<()> {
    let settings = Settings::load();
    let api_key = resolve_api_key()?;

    let device = args.device.or_else(|| settings.device.clone());
    let language = args.language.or_else(|| settings.language.clone());
    let copy_enabled = settings.copy_to_clipboard && !args.no_copy;
    let history = if args.no_history {
        None
    } else {
        Some(HistoryStore::open_default()?)
    };

    memovox_core::verbose!(
        "endpoint {}, device {}",
        settings.endpoint(),
        device.as_deref().unwrap_or("(system default)")
    );

    let backend = match device {
        Some(name) => CpalBackend::new().with_device(name),
        None => CpalBackend::new(),
    };
    let dispatcher = HttpDispatcher::new(settings.endpoint());

    let (outcome_tx, outcome_rx) = unbounded::<Outcome>();
    let handlers = {
        let result_tx = outcome_tx.clone();
        let error_tx = outcome_tx;
        SessionHandlers::new()
            .on_result(move |result| {
                let _ = result_tx.send(Outcome::Transcript(result.clone()));
            })
            .on_error(move |error| {
                let _ = error_tx.send(Outcome::Failed(error.to_string()));
            })
    };

    let mut controller = SessionController::new(backend, dispatcher, handlers);
    controller.set_credential(api_key);
    controller.set_language(language);

    println!(
        "{}  Ctrl+K record/stop · Space pause · Esc cancel · q quit",
        style("memovox").bold()
    );

    enable_raw_mode().context("Failed to enable raw terminal mode")?;
    execute!(std::io::stdout(), EnableFocusChange).ok();

    let result = record_loop(&mut controller, &outcome_rx, copy_enabled, history.as_ref()).await;

    execute!(std::io::stdout(), DisableFocusChange).ok();
    disable_raw_mode().ok();
    result
}

async fn record_loop(
    controller: &mut SessionController<CpalBackend, HttpDispatcher>,
    outcomes: &crossbeam_channel::Receiver<Outcome>,
    copy_enabled: bool,
    history: Option<&HistoryStore>,
) -> Result<()> {
    let (key_tx, key_rx) = unbounded::<KeyAction>();
    let shutdown = Arc::new(AtomicBool::new(false));
    let key_thread = spawn_key_thread(key_tx, Arc::clone(&shutdown));

    status_line(&idle_hint());

    loop {
        match key_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(KeyAction::Toggle) => match controller.state() {
                SessionState::Idle => match controller.start() {
                    Ok(()) => {}
                    Err(e) => say(&format!("{} {e}", style("error:").red().bold())),
                },
                SessionState::Recording | SessionState::Paused => {
                    status_line(&format!("{} processing...", style("◌").cyan()));
                    controller.stop().await;
                    // The key thread kept polling while stop() blocked on
                    // the dispatch; anything pressed in that window targets
                    // a session that no longer exists.
                    discard_pending(&key_rx);
                }
                SessionState::Processing => {}
            },
            Ok(KeyAction::PauseResume) => match controller.state() {
                SessionState::Recording => controller.pause(),
                SessionState::Paused => controller.resume(),
                _ => {}
            },
            Ok(KeyAction::Cancel) => {
                if matches!(
                    controller.state(),
                    SessionState::Recording | SessionState::Paused
                ) {
                    controller.cancel();
                    say(&format!("{} recording discarded", style("✗").yellow()));
                }
            }
            Ok(KeyAction::Quit) => {
                if controller.state() == SessionState::Idle {
                    break;
                }
                say("finish or cancel the recording before quitting");
            }
            Ok(KeyAction::FocusLost) => {
                if controller.state() == SessionState::Recording {
                    say(&format!(
                        "{} terminal unfocused; recording continues (Ctrl+K to stop)",
                        style("●").red()
                    ));
                }
            }
            Ok(KeyAction::FocusGained) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        for outcome in outcomes.try_iter() {
            handle_outcome(outcome, copy_enabled, history);
        }

        match controller.state() {
            SessionState::Recording => status_line(&format!(
                "{} recording {}  (Space pause, Esc cancel, Ctrl+K stop)",
                style("●").red(),
                format_elapsed(controller.elapsed())
            )),
            SessionState::Paused => status_line(&format!(
                "{} paused {}  (Space resume, Esc cancel, Ctrl+K stop)",
                style("‖").yellow(),
                format_elapsed(controller.elapsed())
            )),
            SessionState::Idle => status_line(&idle_hint()),
            SessionState::Processing => {}
        }
    }

    shutdown.store(true, Ordering::SeqCst);
    let _ = key_thread.join();
    status_line("");
    println!();
    Ok(())
}

fn handle_outcome(outcome: Outcome, copy_enabled: bool, history: Option<&HistoryStore>) {
    match outcome {
        Outcome::Transcript(result) => {
            say("");
            say(&format!("{}", style(&result.text).green()));
            if let Some(language) = &result.language {
                say(&format!("{}", style(format!("({language})")).dim()));
            }

            if copy_enabled {
                match memovox_core::copy_to_clipboard(&result.text) {
                    Ok(()) => say(&format!("{}", style("copied to clipboard").dim())),
                    Err(e) => say(&format!("{} {e:#}", style("clipboard:").yellow())),
                }
            }

            if let Some(store) = history {
                match store.save(&result.text) {
                    Ok(Some(record)) => {
                        say(&format!("{}", style(format!("saved as {}", record.id)).dim()))
                    }
                    Ok(None) => say(&format!(
                        "{}",
                        style("too short for history, not saved").dim()
                    )),
                    Err(e) => say(&format!("{} {e}", style("history:").yellow())),
                }
            }
            say("");
        }
        Outcome::Failed(message) => {
            say(&format!("{} {message}", style("error:").red().bold()));
            say("press Ctrl+K to try again");
        }
    }
}

fn spawn_key_thread(
    tx: Sender<KeyAction>,
    shutdown: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while !shutdown.load(Ordering::SeqCst) {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(_) => break,
            }
            let action = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => match key.code {
                    KeyCode::Char('k') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        Some(KeyAction::Toggle)
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        Some(KeyAction::Quit)
                    }
                    KeyCode::Char('q') => Some(KeyAction::Quit),
                    KeyCode::Char(' ') => Some(KeyAction::PauseResume),
                    KeyCode::Esc => Some(KeyAction::Cancel),
                    _ => None,
                },
                Ok(Event::FocusLost) => Some(KeyAction::FocusLost),
                Ok(Event::FocusGained) => Some(KeyAction::FocusGained),
                Ok(_) => None,
                Err(_) => break,
            };
            if let Some(action) = action {
                if tx.send(action).is_err() {
                    break;
                }
            }
        }
    })
}

/// Throw away key actions that queued up while the loop was blocked.
fn discard_pending(keys: &crossbeam_channel::Receiver<KeyAction>) {
    for _ in keys.try_iter() {}
}

fn idle_hint() -> String {
    format!("{} idle  (Ctrl+K to record)", style("○").dim())
}

/// Print a full line while the terminal is in raw mode.
fn say(line: &str) {
    print!("\r{:<78}\r\n", line);
    let _ = std::io::stdout().flush();
}

/// Redraw the in-place status line.
fn status_line(line: &str) {
    print!("\r{:<78}", line);
    let _ = std::io::stdout().flush();
}
