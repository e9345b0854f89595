//! Input handling for the TUI.
//!
//! This module processes keyboard input and dispatches to the appropriate
//! handler based on current view and mode.

use crate::app::{App, AppEvent, ConfirmAction, FeedPhase, Focus, View};
use crate::douban::Category;
use crate::storage::{TagError, RESERVED_TAG};
use crate::util::validate_remote_url;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::start_feed_load;
use super::Action;

/// Maximum length of a tag typed into the add-tag prompt (UI layer limit;
/// the store scrubs and validates again on commit).
const MAX_TAG_INPUT: usize = 32;

/// Main input dispatch function.
///
/// Routes input to the appropriate handler based on current mode and view.
/// Overlays capture all keys while visible.
pub(super) async fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    if app.show_help {
        return Ok(handle_help_input(app, code));
    }

    if app.pending_confirm.is_some() {
        return handle_confirm_input(app, code, event_tx).await;
    }

    if app.tag_input.is_some() {
        return handle_tag_entry_input(app, code).await;
    }

    match app.view {
        View::Browse => handle_browse_input(app, code, modifiers, event_tx).await,
        View::Detail => Ok(handle_detail_input(app, code)),
    }
}

/// Handle input while the help overlay is visible.
///
/// Captures all keys: j/k/Up/Down scroll, Esc/q/? dismiss.
fn handle_help_input(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
            app.show_help = false;
            app.help_scroll = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.help_scroll = app.help_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.help_scroll = app.help_scroll.saturating_sub(1);
        }
        _ => {}
    }
    Action::Continue
}

/// Handle input while a confirmation dialog is visible.
///
/// y/Enter confirms, n/Esc cancels, everything else is swallowed.
async fn handle_confirm_input(
    app: &mut App,
    code: KeyCode,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    match code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            if let Some(action) = app.pending_confirm.take() {
                match action {
                    ConfirmAction::DeleteTag { category, name } => {
                        confirm_delete_tag(app, category, name, event_tx).await;
                    }
                    ConfirmAction::ResetTags { category } => {
                        confirm_reset_tags(app, category, event_tx).await;
                    }
                }
            }
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.pending_confirm = None;
        }
        _ => {}
    }
    Ok(Action::Continue)
}

async fn confirm_delete_tag(
    app: &mut App,
    category: Category,
    name: String,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    match app.tag_store.delete_tag(category, &name).await {
        Ok(true) => {
            app.set_status(format!("Deleted tag: {}", name));
            // Deleting the tag whose feed is on screen falls back to the
            // reserved one
            if app.cursor.category == category && app.cursor.tag == name {
                if app.switch_tag(RESERVED_TAG) {
                    start_feed_load(app, event_tx);
                }
                app.selected_tag = 0;
            }
            app.clamp_selections();
        }
        Ok(false) => {
            app.set_status(format!("Tag not found: {}", name));
        }
        Err(e) => {
            tracing::warn!(tag = %name, error = %e, "Tag deletion failed");
            app.set_status(e.to_string());
        }
    }
}

async fn confirm_reset_tags(app: &mut App, category: Category, event_tx: &mpsc::Sender<AppEvent>) {
    match app.tag_store.reset_to_default(category).await {
        Ok(()) => {
            app.set_status("Tags restored to defaults");
            let active_gone = app.cursor.category == category
                && !app.current_tags().iter().any(|t| *t == app.cursor.tag);
            if active_gone && app.switch_tag(RESERVED_TAG) {
                start_feed_load(app, event_tx);
            }
            app.selected_tag = app
                .current_tags()
                .iter()
                .position(|t| *t == app.cursor.tag)
                .unwrap_or(0);
            app.clamp_selections();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Tag reset failed");
            app.set_status(e.to_string());
        }
    }
}

/// Handle input while the add-tag prompt is open.
async fn handle_tag_entry_input(app: &mut App, code: KeyCode) -> Result<Action> {
    match code {
        KeyCode::Esc => {
            app.tag_input = None;
        }
        KeyCode::Enter => {
            let name = app.tag_input.clone().unwrap_or_default();
            let category = app.cursor.category;
            match app.tag_store.add_tag(category, &name).await {
                Ok(clean) => {
                    app.tag_input = None;
                    // New tags append to the end of the list
                    app.selected_tag = app.current_tags().len().saturating_sub(1);
                    app.set_status(format!("Added tag: {}", clean));
                }
                // Keep the prompt open so the input can be corrected
                Err(e @ (TagError::Empty | TagError::Duplicate | TagError::Reserved)) => {
                    app.set_status(e.to_string());
                }
                Err(e @ TagError::Storage(_)) => {
                    tracing::warn!(tag = %name, error = %e, "Tag save failed");
                    app.tag_input = None;
                    app.set_status(e.to_string());
                }
            }
        }
        KeyCode::Backspace => {
            if let Some(input) = &mut app.tag_input {
                input.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(input) = &mut app.tag_input {
                if input.chars().count() < MAX_TAG_INPUT {
                    input.push(c);
                }
            }
        }
        _ => {}
    }
    Ok(Action::Continue)
}

/// Handle input in browse view (tag strip + card grid).
async fn handle_browse_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Char('?') => {
            app.show_help = true;
        }
        KeyCode::Tab => {
            app.focus = match app.focus {
                Focus::Tags => Focus::Grid,
                Focus::Grid => Focus::Tags,
            };
        }

        // Navigation in the focused panel
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            Focus::Grid => app.select_next(),
            Focus::Tags => app.tag_next(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            Focus::Grid => app.select_prev(),
            Focus::Tags => app.tag_prev(),
        },
        KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
            if app.focus == Focus::Grid {
                app.select_page_down();
            }
        }
        KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
            if app.focus == Focus::Grid {
                app.select_page_up();
            }
        }
        KeyCode::PageDown => {
            if app.focus == Focus::Grid {
                app.select_page_down();
            }
        }
        KeyCode::PageUp => {
            if app.focus == Focus::Grid {
                app.select_page_up();
            }
        }
        KeyCode::Char('g') | KeyCode::Home => {
            if app.focus == Focus::Grid {
                app.select_first();
            }
        }
        KeyCode::Char('G') | KeyCode::End => {
            if app.focus == Focus::Grid {
                app.select_last();
            }
        }

        KeyCode::Enter => match app.focus {
            // Activate the highlighted tag
            Focus::Tags => {
                if let Some(tag) = app.selected_tag_name().map(str::to_owned) {
                    if app.switch_tag(&tag) {
                        start_feed_load(app, event_tx);
                    }
                }
            }
            // Open the detail card
            Focus::Grid => {
                app.enter_detail();
            }
        },

        // Category switch
        KeyCode::Char('1') => switch_category(app, Category::Movie, event_tx).await,
        KeyCode::Char('2') => switch_category(app, Category::Tv, event_tx).await,

        // Manual load more
        KeyCode::Char(' ') => {
            if !start_feed_load(app, event_tx) {
                if app.cursor.exhausted {
                    app.set_status("End of feed");
                } else if matches!(app.phase, FeedPhase::Error { .. }) {
                    app.set_status("Load failed (r to retry)");
                } else if !app.enabled {
                    app.set_status("Recommendations are disabled (e to enable)");
                }
            }
        }

        // Fresh batch for the same tag
        KeyCode::Char('b') => {
            if app.enabled {
                app.rotate_feed();
                start_feed_load(app, event_tx);
            }
        }

        // Retry after an error, or refresh from the top
        KeyCode::Char('r') => {
            if app.clear_error() {
                start_feed_load(app, event_tx);
            } else if app.enabled {
                let category = app.cursor.category;
                let tag = app.cursor.tag.clone();
                app.reset_feed(category, tag);
                start_feed_load(app, event_tx);
            }
        }

        // Auto-load toggle (session only, not persisted)
        KeyCode::Char('s') => {
            let enabled = !app.trigger.is_enabled();
            app.trigger.set_enabled(enabled);
            app.set_status(if enabled {
                "Auto-load on"
            } else {
                "Auto-load off"
            });
        }

        // Feature gate toggle, persisted
        KeyCode::Char('e') => {
            toggle_feed_enabled(app, event_tx).await;
        }

        // Tag management
        KeyCode::Char('a') => {
            app.tag_input = Some(String::new());
        }
        KeyCode::Char('d') => {
            if app.focus == Focus::Tags {
                if let Some(name) = app.selected_tag_name().map(str::to_owned) {
                    app.pending_confirm = Some(ConfirmAction::DeleteTag {
                        category: app.cursor.category,
                        name,
                    });
                }
            }
        }
        KeyCode::Char('D') => {
            app.pending_confirm = Some(ConfirmAction::ResetTags {
                category: app.cursor.category,
            });
        }

        KeyCode::Char('o') => {
            open_selected_in_browser(app);
        }

        _ => {}
    }

    Ok(Action::Continue)
}

/// Handle input in detail view.
fn handle_detail_input(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Esc | KeyCode::Char('b') | KeyCode::Backspace => {
            app.exit_detail();
        }
        KeyCode::Char('o') => {
            if let Some(url) = app.detail_item.as_ref().map(|i| i.detail_url.clone()) {
                open_in_browser(app, &url);
            }
        }
        KeyCode::Char('?') => {
            app.show_help = true;
        }
        _ => {}
    }
    Action::Continue
}

async fn switch_category(app: &mut App, category: Category, event_tx: &mpsc::Sender<AppEvent>) {
    if !app.switch_category(category) {
        return;
    }
    start_feed_load(app, event_tx);

    if let Err(e) = app.db.set_last_category(category).await {
        tracing::warn!(error = %e, "Failed to persist category");
        app.set_status(format!("Failed to save setting: {}", e));
    }
}

async fn toggle_feed_enabled(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let enabling = !app.enabled;
    app.apply_enabled(enabling);

    if enabling {
        // The disable path dropped all items; restart the active feed
        let category = app.cursor.category;
        let tag = app.cursor.tag.clone();
        app.reset_feed(category, tag);
        start_feed_load(app, event_tx);
        app.set_status("Recommendations enabled");
    } else {
        app.set_status("Recommendations disabled");
    }

    // In-memory state wins either way; a failed write only costs the next
    // session its setting
    if let Err(e) = app.db.set_feed_enabled(enabling).await {
        tracing::warn!(error = %e, "Failed to persist feed gate");
        app.set_status(format!("Failed to save setting: {}", e));
    }
}

fn open_selected_in_browser(app: &mut App) {
    let Some(url) = app.selected_item().map(|i| i.detail_url.clone()) else {
        return;
    };
    open_in_browser(app, &url);
}

fn open_in_browser(app: &mut App, url: &str) {
    // SEC: Validate URL before open::that() to prevent command injection
    if let Err(e) = validate_remote_url(url) {
        app.set_status(format!("Refusing to open URL: {}", e));
    } else if let Err(e) = open::that(url) {
        app.set_status(format!("Failed to open browser: {}", e));
    } else {
        app.set_status("Opening in browser...");
    }
}
