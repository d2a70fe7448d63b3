//! nvim-tui - terminal front-end for an embedded Neovim.
//!
//! Spawns the editor, attaches as its UI, and runs the main event loop:
//! redraw batches come in from the connection's reader task, key presses
//! go out through a single ordered input task.

mod input;
mod ui;

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, Event,
        KeyEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nvim_tui::config::{self, EditorConfig, DEFAULT_LOG_FILTER};
use nvim_tui::grid::{Grid, SharedGrid};
use nvim_tui::session::{GridObserver, Session};

/// Global flag to track if terminal is in raw mode (for panic cleanup)
static TERMINAL_RAW: AtomicBool = AtomicBool::new(false);

const LOG_FILE: &str = "nvim-tui.log";

/// Upper bound on how long the loop sleeps waiting for terminal input.
const FRAME_DURATION: Duration = Duration::from_millis(16);

/// RAII guard for terminal state management.
/// Ensures terminal is restored to normal state when dropped, even on panic or early return.
struct TerminalGuard;

impl TerminalGuard {
    /// Raw mode, alternate screen, bracketed paste.
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        TERMINAL_RAW.store(true, Ordering::SeqCst);

        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen, EnableBracketedPaste) {
            let _ = disable_raw_mode();
            TERMINAL_RAW.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(
        io::stdout(),
        LeaveAlternateScreen,
        DisableBracketedPaste,
        DisableMouseCapture
    );
    let _ = io::stdout().flush();
    TERMINAL_RAW.store(false, Ordering::SeqCst);
}

/// Install a panic hook that restores terminal state before printing panic info.
fn install_panic_hook() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        if TERMINAL_RAW.load(Ordering::SeqCst) {
            restore_terminal();
        }
        default_hook(panic_info);
    }));
}

/// Log to a file; the terminal belongs to the editor.
fn init_logging() -> Result<()> {
    let dir = config::log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
        .context("Failed to open log file")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

/// What the reader task tells the main loop.
enum SessionEvent {
    Redraw,
    Closed(String),
}

/// Forwards grid notifications to the main loop.
struct ChannelObserver {
    tx: Sender<SessionEvent>,
}

impl GridObserver for ChannelObserver {
    fn on_grid_updated(&self, _grid: &Grid) {
        let _ = self.tx.send(SessionEvent::Redraw);
    }

    fn on_closed(&self, reason: &str) {
        let _ = self.tx.send(SessionEvent::Closed(reason.to_string()));
    }
}

/// Work for the input task, processed strictly in order.
enum Command {
    Keys(String),
    Resize(u16, u16),
}

/// Owns the session: forwards input, then shuts the editor down once the
/// main loop drops its sender.
async fn run_input(mut session: Session, mut commands: UnboundedReceiver<Command>) {
    while let Some(command) = commands.recv().await {
        let result = match command {
            Command::Keys(keys) => session.send_input(&keys).await,
            Command::Resize(width, height) => session.resize(width, height).await,
        };
        if let Err(e) = result {
            warn!("Editor request failed: {}", e);
            if session.is_closed() {
                break;
            }
        }
    }
    if let Err(e) = session.shutdown().await {
        error!("Editor shutdown failed: {:#}", e);
    }
}

fn main() -> Result<()> {
    install_panic_hook();
    init_logging()?;
    info!("Starting nvim-tui v{}", env!("CARGO_PKG_VERSION"));

    let mut config = EditorConfig::load()?;
    let (width, height) = crossterm::terminal::size().context("Failed to read terminal size")?;
    (config.width, config.height) = ui::editor_size(width, height);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let (event_tx, event_rx) = mpsc::channel();
    let observer = Arc::new(ChannelObserver { tx: event_tx });

    let session = runtime.block_on(async {
        let session = Session::spawn(&config, Some(observer))?;
        session.attach().await.context("Failed to attach UI")?;
        anyhow::Ok(session)
    })?;
    let grid = session.grid().clone();

    let (command_tx, command_rx) = unbounded_channel();
    let input_task = runtime.spawn(run_input(session, command_rx));

    let guard = TerminalGuard::new()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = run_app(&mut terminal, &grid, &event_rx, &command_tx);
    let _ = terminal.show_cursor();
    drop(guard);

    // Closing the channel lets the input task shut the editor down.
    drop(command_tx);
    if let Err(e) = runtime.block_on(input_task) {
        error!("Input task failed: {}", e);
    }

    match result {
        Ok(reason) => {
            info!("Editor session ended: {}", reason);
            Ok(())
        }
        Err(e) => {
            error!("Application error: {:#}", e);
            Err(e)
        }
    }
}

/// Main application loop. Returns the close reason once the editor is gone.
fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    grid: &SharedGrid,
    events: &Receiver<SessionEvent>,
    commands: &UnboundedSender<Command>,
) -> Result<String> {
    let mut needs_redraw = true;

    loop {
        while let Ok(event) = events.try_recv() {
            match event {
                SessionEvent::Redraw => needs_redraw = true,
                SessionEvent::Closed(reason) => return Ok(reason),
            }
        }

        if needs_redraw {
            terminal.draw(|frame| grid.read(|g| ui::render(frame, g)))?;
            needs_redraw = false;
        }

        if !event::poll(FRAME_DURATION)? {
            continue;
        }
        let command = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                input::encode_key(&key).map(Command::Keys)
            }
            Event::Paste(text) => Some(Command::Keys(input::encode_paste(&text))),
            Event::Resize(width, height) => {
                needs_redraw = true;
                let (cols, rows) = ui::editor_size(width, height);
                Some(Command::Resize(cols, rows))
            }
            _ => None,
        };
        if let Some(command) = command {
            if commands.send(command).is_err() {
                return Ok("input task stopped".to_string());
            }
        }
    }
}
