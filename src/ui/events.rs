//! Application event handling.
//!
//! This module folds background task results (page loads, cover probes)
//! back into application state.

use crate::app::{App, AppEvent, FeedPhase};
use tokio::sync::mpsc;

use super::helpers::{maybe_autoload, request_covers};

/// Handle application events from background tasks.
pub(super) async fn handle_app_event(
    app: &mut App,
    event: AppEvent,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    match event {
        AppEvent::PageLoaded { generation, result } => {
            app.apply_page(generation, result);
            app.clamp_selections();

            // New cards may sit inside the viewport or lookahead band
            request_covers(app, event_tx);

            // If the viewport still hugs the trailing edge (tall terminal,
            // short page), keep filling until the threshold is satisfied
            maybe_autoload(app, event_tx);
        }

        AppEvent::CoverResolved {
            item_id,
            source_url,
            outcome,
        } => {
            app.apply_cover(item_id, source_url, outcome);
            // A probe slot freed up; schedule the next pending cover
            request_covers(app, event_tx);
        }

        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error, "Background task panicked");
            app.set_status(format!("Internal error in {} task", task));

            // A page task that died before reporting would otherwise leave
            // the feed stuck in Loading with no event ever arriving
            if task == "page_load" && matches!(app.phase, FeedPhase::Loading) {
                app.cursor.loading = false;
                app.feed_handle = None;
                app.phase = FeedPhase::Error {
                    message: "internal error".to_string(),
                };
                app.trigger.settle();
            }

            // Likewise, a dead cover probe must give its budget slot back
            if task == "cover_probe" {
                app.covers_inflight = app.covers_inflight.saturating_sub(1);
            }
        }
    }
}
