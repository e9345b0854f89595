//! The TUI event loop: terminal input, background task results, and a
//! periodic tick multiplexed over one `tokio::select!`.

use crate::app::{App, AppEvent};
use anyhow::Result;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::events::handle_app_event;
use super::helpers::{maybe_autoload, request_covers, start_feed_load};
use super::input::handle_input;
use super::render::render;

/// What a handled key press asks the loop to do.
pub enum Action {
    Continue,
    /// Leave the loop and restore the terminal.
    Quit,
}

/// Drive the application until the user quits or a shutdown signal arrives.
///
/// One `select!` multiplexes, in priority order: shutdown signals, terminal
/// input, results from spawned page/cover tasks, and a 250ms tick that feeds
/// the spinner, the scroll trigger, and cover scheduling. Frames are drawn
/// only when `needs_redraw` is set.
pub async fn run(
    app: &mut App,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    // The hook must be registered before raw mode is entered; a panic
    // between the two would leave the shell in raw mode with no prompt.
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        previous_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let mut input_events = crossterm::event::EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    // Kick off the first page before the first frame; further pages arrive
    // through the scroll trigger or explicit keys.
    start_feed_load(app, &event_tx);

    loop {
        // Expire the status line first so a stale message never makes it
        // into the frame about to be drawn
        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        if app.needs_redraw {
            terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;
        }

        // Fold in everything that queued up while we were drawing, so input
        // handled below always sees fresh feed state
        while let Ok(event) = event_rx.try_recv() {
            app.needs_redraw = true;
            handle_app_event(app, event, &event_tx).await;
        }

        // Rebuilt each pass; on non-Unix targets there is nothing to wait on
        #[cfg(unix)]
        let shutdown = async {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        };
        #[cfg(not(unix))]
        let shutdown = std::future::pending::<&str>();

        tokio::select! {
            biased;

            name = shutdown => {
                tracing::info!(signal = name, "Shutting down");
                break;
            }

            Some(event) = input_events.next() => {
                match event {
                    Ok(Event::Key(key)) => {
                        app.needs_redraw = true;
                        match handle_input(app, key.code, key.modifiers, &event_tx).await {
                            Ok(Action::Quit) => break,
                            Ok(Action::Continue) => {}
                            Err(e) => app.set_status(format!("Error: {}", e)),
                        }
                    }
                    Ok(Event::Resize(_, _)) => app.needs_redraw = true,
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Terminal event stream error"),
                }
            }

            // Woken by the first result after an empty queue; the drain
            // above batches any that follow
            Some(event) = event_rx.recv() => {
                app.needs_redraw = true;
                handle_app_event(app, event, &event_tx).await;
            }

            _ = ticker.tick() => {
                handle_tick(app, &event_tx);
            }
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

/// Handle the periodic tick.
///
/// The scroll trigger is re-evaluated here rather than on every key press:
/// the 250ms cadence sits comfortably above the trigger's own debounce, and
/// one call site keeps the gating in a single place.
fn handle_tick(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if app.advance_spinner() {
        app.needs_redraw = true;
    }

    maybe_autoload(app, event_tx);
    request_covers(app, event_tx);
}

/// Raw mode plus the alternate screen, the pair the panic hook undoes.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(io::stdout()))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
