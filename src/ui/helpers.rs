//! Task spawning and shared helpers for the UI layer.
//!
//! Network work never runs on the event loop: page loads and cover probes
//! are spawned here and report back through the `AppEvent` channel.

use crate::app::{App, AppEvent, CoverRequest};
use crate::douban::{cover_candidates, PageQuery};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

/// Frames of the loading spinner, indexed by `app.spinner_frame`.
pub(super) const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Wraps a future to catch panics and convert them to errors.
///
/// Instead of a panicking background task silently disappearing into the
/// Tokio runtime, the panic message comes back as `Err(String)` so the
/// event loop can surface it.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Start a page load if the feed accepts one right now.
///
/// Returns true when a task was spawned. All the gating (feature off, load
/// in flight, sticky error, exhausted) lives in [`App::begin_feed_load`].
pub(super) fn start_feed_load(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) -> bool {
    match app.begin_feed_load() {
        Some((query, generation)) => {
            spawn_page_load(app, query, generation, event_tx);
            true
        }
        None => false,
    }
}

/// Evaluate the scroll trigger and start a load when it fires.
pub(super) fn maybe_autoload(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if !app.observe_scroll(std::time::Instant::now()) {
        return;
    }
    if !start_feed_load(app, event_tx) {
        // Gates are re-checked between observe and begin; un-fire instead of
        // leaving the trigger wedged
        app.trigger.settle();
    }
}

/// Spawn the background task for one page request.
///
/// The task echoes back the generation it was spawned with; `apply_page`
/// uses it to discard results that a reset has since invalidated.
pub(super) fn spawn_page_load(
    app: &mut App,
    query: PageQuery,
    generation: u64,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let loader = app.loader.clone();
    let tx = event_tx.clone();

    tracing::debug!(
        category = %query.category,
        tag = %query.tag,
        offset = query.offset,
        generation,
        "Spawning page load task"
    );

    app.feed_handle = Some(tokio::spawn(async move {
        let tx_panic = tx.clone();
        match catch_task_panic(async {
            let result = loader.load_page(&query).await;
            if let Err(e) = tx.send(AppEvent::PageLoaded { generation, result }).await {
                tracing::warn!(error = %e, event = "PageLoaded", "Channel send failed (receiver dropped)");
            }
        })
        .await
        {
            Ok(()) => {}
            Err(panic_msg) => {
                tracing::error!(task = "page_load", error = %panic_msg, "Background task panicked");
                let _ = tx_panic
                    .send(AppEvent::TaskPanicked {
                        task: "page_load",
                        error: panic_msg,
                    })
                    .await;
            }
        }
    }));
}

/// Spawn probes for every cover the app wants resolved right now.
///
/// [`App::next_cover_requests`] enforces the in-flight budget and the
/// viewport-plus-lookahead window; this just turns its picks into tasks.
pub(super) fn request_covers(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    for request in app.next_cover_requests() {
        spawn_cover_probe(app, request, event_tx);
    }
}

/// Spawn one cover probe task.
///
/// Cover tasks are fire-and-forget: they are not aborted on feed resets
/// because their results still feed the URL-keyed cache.
fn spawn_cover_probe(app: &App, request: CoverRequest, event_tx: &mpsc::Sender<AppEvent>) {
    let resolver = app.covers.clone();
    let candidates = cover_candidates(Some(request.source_url.as_ref()), &app.cover_proxy_base);
    let tx = event_tx.clone();

    tokio::spawn(async move {
        let tx_panic = tx.clone();
        match catch_task_panic(async {
            let outcome = resolver.resolve(&candidates).await;
            if let Err(e) = tx
                .send(AppEvent::CoverResolved {
                    item_id: request.item_id,
                    source_url: request.source_url,
                    outcome,
                })
                .await
            {
                tracing::warn!(error = %e, event = "CoverResolved", "Channel send failed (receiver dropped)");
            }
        })
        .await
        {
            Ok(()) => {}
            Err(panic_msg) => {
                tracing::error!(task = "cover_probe", error = %panic_msg, "Background task panicked");
                let _ = tx_panic
                    .send(AppEvent::TaskPanicked {
                        task: "cover_probe",
                        error: panic_msg,
                    })
                    .await;
            }
        }
    });
}
