use std::io::{self, Stderr};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind, MouseEvent,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use rag_chat_core::schedule::{every, spawn_cancellable};
use rag_chat_core::{RevealTick, TaskGuard, TransportError};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde_json::Value;
use tokio::sync::mpsc;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

/// Which reveal engine a tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealSlot {
    Welcome,
    Reply,
}

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// Slow tick for the loading indicator
    Tick,
    /// Particle animation frame
    Frame,
    Reveal { slot: RevealSlot, tick: RevealTick },
    Reply(Result<Value, TransportError>),
}

pub type EventSender = mpsc::UnboundedSender<AppEvent>;

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    tx: EventSender,
    _reader: TaskGuard,
    _ticker: TaskGuard,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Terminal event reader
        let tx_events = tx.clone();
        let reader = spawn_cancellable(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let app_event = match evt {
                    // Only handle key press events, not release
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
                    Ok(Event::Mouse(mouse)) => Some(AppEvent::Mouse(mouse)),
                    Ok(Event::Resize(w, h)) => Some(AppEvent::Resize(w, h)),
                    Ok(_) => None,
                    Err(err) => {
                        tracing::warn!(%err, "terminal event stream failed");
                        break;
                    }
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        let tx_tick = tx.clone();
        let ticker = every(tick_rate, move || tx_tick.send(AppEvent::Tick).is_ok());

        Self {
            rx,
            tx,
            _reader: reader,
            _ticker: ticker,
        }
    }

    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

/// Enter raw mode on the alternate screen with mouse capture, drawing to
/// stderr.
pub fn init() -> Result<Tui> {
    enable_raw_mode().context("enabling raw mode")?;
    execute!(io::stderr(), EnterAlternateScreen, EnableMouseCapture)
        .context("entering alternate screen")?;
    Ok(Terminal::new(CrosstermBackend::new(io::stderr()))?)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Put the terminal back before the default hook prints the panic.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Err(err) = restore() {
            eprintln!("failed to restore terminal: {err}");
        }
        default_hook(info);
    }));
}
