use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::Result;
use lru::LruCache;
use reqwest::redirect::Policy;
use tokio::time::Instant;

use crate::config::Config;
use crate::douban::{
    Category, CoverOutcome, CoverResolver, CoverState, FeedCursor, FeedItem, FeedLoader, FeedPage,
    LoadError, PageQuery, ProxyClient, ScrollTrigger,
};
use crate::storage::{Database, TagStore, RESERVED_TAG};

/// Concurrent cover probes. Covers are cosmetic; a handful at a time keeps
/// the relay happy while a page of them resolves quickly.
pub const MAX_COVER_INFLIGHT: usize = 4;

/// Resolved-cover cache entries (keyed by source URL).
const COVER_CACHE_CAPACITY: usize = 512;

/// Desktop browser UA; the upstream endpoint rejects obvious bot agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// ============================================================================
// HTTP Client Configuration
// ============================================================================

/// Create a custom redirect policy with loop detection and limited hops.
///
/// Public relays frequently answer with a redirect to the upstream host;
/// three hops covers every chain seen in practice while a loop between two
/// misconfigured relays is cut short.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// Build the shared HTTP client used for feed pages and cover probes.
pub fn build_http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        // Outer safety net; the per-attempt timeout is enforced by the proxy client
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    Ok(client)
}

// ============================================================================
// View and Focus Enums
// ============================================================================

/// Current view mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Browse, // Tag strip + item grid
    Detail, // Full-screen card for one item
}

/// Which panel has focus in Browse view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tags,
    Grid,
}

// ============================================================================
// Feed Lifecycle
// ============================================================================

/// Where the feed pipeline currently stands.
///
/// `Loading` mirrors `cursor.loading`; `Error` is sticky until the user
/// retries, so a failed page never auto-refires through the scroll trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Loading,
    Error { message: String },
}

// ============================================================================
// Confirmation Dialog
// ============================================================================

/// Pending confirmation action for destructive operations.
pub enum ConfirmAction {
    /// Delete one user tag from a category's list.
    DeleteTag { category: Category, name: String },
    /// Replace a category's tag list with the built-in defaults.
    ResetTags { category: Category },
}

// ============================================================================
// Events
// ============================================================================

/// One cover probe the UI layer should spawn.
pub struct CoverRequest {
    pub item_id: Arc<str>,
    pub source_url: Arc<str>,
}

/// Events from background tasks
pub enum AppEvent {
    /// A feed page task finished (success or failure).
    ///
    /// `generation` is the feed generation at spawn time; results from an
    /// older generation are discarded because the cursor was reset while the
    /// request was in flight.
    PageLoaded {
        generation: u64,
        result: Result<FeedPage, LoadError>,
    },
    /// A cover probe finished.
    CoverResolved {
        item_id: Arc<str>,
        source_url: Arc<str>,
        outcome: CoverOutcome,
    },
    /// A background task panicked.
    TaskPanicked { task: &'static str, error: String },
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state
pub struct App {
    pub db: Database,
    pub http_client: reqwest::Client,
    pub loader: FeedLoader,
    pub covers: CoverResolver,
    pub tag_store: TagStore,

    // Feed state
    pub cursor: FeedCursor,
    /// Items appended in arrival order; the grid renders this directly.
    pub items: Vec<FeedItem>,
    pub phase: FeedPhase,
    /// Whether the feed feature is on at all (`douban.enabled`). When off,
    /// nothing is fetched and the grid shows a hint instead.
    pub enabled: bool,
    pub trigger: ScrollTrigger,

    /// Generation counter for feed loads to handle race conditions.
    ///
    /// Incremented on every reset (tag switch, category switch, refresh,
    /// shuffle). The spawned task echoes the generation it was started with;
    /// `apply_page` rejects mismatches so a slow response for an old tag can
    /// never leak into a freshly reset feed.
    pub feed_generation: u64,

    /// Handle to the in-flight page task for cancellation on reset.
    pub feed_handle: Option<tokio::task::JoinHandle<()>>,

    // Covers
    /// Per-item cover resolution state, keyed by item id.
    pub cover_states: HashMap<Arc<str>, CoverState>,
    /// Resolved outcomes keyed by source URL, surviving feed resets so a tag
    /// round-trip does not re-probe the same covers.
    pub cover_cache: LruCache<Arc<str>, CoverOutcome>,
    pub covers_inflight: usize,
    /// Rows past the visible window that still get their covers resolved.
    pub cover_lookahead_rows: u16,
    /// Primary relay prefix used to build proxied cover candidates.
    pub cover_proxy_base: String,

    // UI State
    pub view: View,
    pub focus: Focus,
    pub selected: usize,
    pub selected_tag: usize,
    /// Item shown in Detail view, cloned so a feed reset underneath does not
    /// blank the open card.
    pub detail_item: Option<FeedItem>,

    /// Grid viewport from the last render: (first visible index, height in
    /// rows). Drives both the scroll trigger gap and cover lookahead.
    pub grid_window: (usize, usize),

    /// Transient status line text and the instant it stops being shown.
    pub status_message: Option<(Cow<'static, str>, Instant)>,

    /// Dirty flag to skip unnecessary frame renders
    pub needs_redraw: bool,

    /// Current frame of the loading spinner animation.
    pub spinner_frame: usize,

    /// Tag being typed in the add-tag prompt, when open.
    pub tag_input: Option<String>,

    /// Whether the help overlay is currently displayed.
    pub show_help: bool,

    /// Scroll offset inside the help overlay.
    pub help_scroll: usize,

    /// Pending confirmation dialog for destructive operations.
    ///
    /// When set, the UI renders a confirmation overlay and input is routed
    /// to the confirmation handler instead of normal dispatch.
    pub pending_confirm: Option<ConfirmAction>,
}

impl App {
    pub fn new(
        db: Database,
        config: &Config,
        tag_store: TagStore,
        category: Category,
        enabled: bool,
    ) -> Result<Self> {
        let http_client = build_http_client()?;

        let proxy = ProxyClient::new(
            http_client.clone(),
            config.proxy_endpoints(),
            config.request_timeout(),
            config.referer.clone(),
            config.proxy_auth_token(),
        );
        let loader = FeedLoader::new(proxy, config.api_base.clone(), config.max_retries);
        let covers = CoverResolver::new(http_client.clone(), config.request_timeout());

        let mut trigger = ScrollTrigger::new(config.scroll_threshold_rows);
        if enabled {
            trigger.attach();
        }
        trigger.set_enabled(config.auto_load);

        let selected_tag = tag_store
            .tags(category)
            .iter()
            .position(|t| t == RESERVED_TAG)
            .unwrap_or(0);

        Ok(Self {
            db,
            http_client,
            loader,
            covers,
            tag_store,
            cursor: FeedCursor::new(category, RESERVED_TAG, config.page_size),
            items: Vec::new(),
            phase: FeedPhase::Idle,
            enabled,
            trigger,
            feed_generation: 0,
            feed_handle: None,
            cover_states: HashMap::new(),
            cover_cache: LruCache::new(
                NonZeroUsize::new(COVER_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            ),
            covers_inflight: 0,
            cover_lookahead_rows: config.cover_lookahead_rows,
            cover_proxy_base: config.proxy.base.clone(),
            view: View::Browse,
            focus: Focus::Grid,
            selected: 0,
            selected_tag,
            detail_item: None,
            grid_window: (0, 0),
            status_message: None,
            needs_redraw: true,
            spinner_frame: 0,
            tag_input: None,
            show_help: false,
            help_scroll: 0,
            pending_confirm: None,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Get currently selected item (bounds-checked)
    pub fn selected_item(&self) -> Option<&FeedItem> {
        self.items.get(self.selected)
    }

    /// Tag list for the active category.
    pub fn current_tags(&self) -> &[String] {
        self.tag_store.tags(self.cursor.category)
    }

    /// Name of the highlighted tag in the strip (bounds-checked).
    pub fn selected_tag_name(&self) -> Option<&str> {
        self.current_tags().get(self.selected_tag).map(String::as_str)
    }

    pub fn cover_state(&self, item_id: &str) -> CoverState {
        self.cover_states
            .get(item_id)
            .cloned()
            .unwrap_or(CoverState::Pending)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, FeedPhase::Loading) || self.covers_inflight > 0
    }

    // ========================================================================
    // Feed Loading
    // ========================================================================

    /// Claim the in-flight slot and describe the next page to fetch.
    ///
    /// Returns `None` when nothing should be loaded: feature off, a load
    /// already running, an unretried error, or the feed exhausted. The caller
    /// spawns the actual request task with the returned query and generation.
    pub fn begin_feed_load(&mut self) -> Option<(PageQuery, u64)> {
        if !self.enabled || !matches!(self.phase, FeedPhase::Idle) || !self.cursor.can_load_more() {
            return None;
        }
        self.cursor.loading = true;
        self.phase = FeedPhase::Loading;
        self.needs_redraw = true;
        Some((PageQuery::from_cursor(&self.cursor), self.feed_generation))
    }

    /// Fold a finished page task back into the feed.
    ///
    /// Results from an older generation are dropped without touching the
    /// cursor: the reset that bumped the generation already cleaned up, and a
    /// newer load may be running for the current one.
    pub fn apply_page(&mut self, generation: u64, result: Result<FeedPage, LoadError>) {
        if generation != self.feed_generation {
            tracing::debug!(
                generation,
                current = self.feed_generation,
                "Dropping stale feed page"
            );
            return;
        }

        self.cursor.loading = false;
        self.feed_handle = None;

        match result {
            Ok(page) => {
                if page.skipped > 0 {
                    tracing::warn!(skipped = page.skipped, "Skipped malformed feed entries");
                }
                self.cursor.advance(page.fetched);
                for item in &page.items {
                    self.cover_states
                        .entry(Arc::clone(&item.id))
                        .or_insert(CoverState::Pending);
                }
                self.items.extend(page.items);
                self.phase = FeedPhase::Idle;
            }
            Err(e) => {
                tracing::warn!(error = %e, offset = self.cursor.offset, "Feed page load failed");
                self.phase = FeedPhase::Error {
                    message: e.to_string(),
                };
            }
        }

        self.trigger.settle();
        self.needs_redraw = true;
    }

    /// Rewind to page one of a (possibly different) category/tag feed.
    ///
    /// Aborts any in-flight load and bumps the generation so its late result
    /// is discarded if the abort lost the race.
    pub fn reset_feed(&mut self, category: Category, tag: impl Into<String>) {
        self.abort_feed_task();
        self.feed_generation = self.feed_generation.wrapping_add(1);
        self.cursor.reset(category, tag);
        self.items.clear();
        self.cover_states.clear();
        self.selected = 0;
        self.grid_window = (0, 0);
        self.phase = FeedPhase::Idle;
        self.trigger.settle();
        self.needs_redraw = true;
    }

    /// Shuffle: clear the grid and jump the cursor one page forward so the
    /// next load brings a fresh batch for the same tag.
    pub fn rotate_feed(&mut self) {
        self.abort_feed_task();
        self.feed_generation = self.feed_generation.wrapping_add(1);
        self.cursor.loading = false;
        self.cursor.rotate();
        self.items.clear();
        self.cover_states.clear();
        self.selected = 0;
        self.grid_window = (0, 0);
        self.phase = FeedPhase::Idle;
        self.trigger.settle();
        self.needs_redraw = true;
    }

    /// Acknowledge a load error so the next load attempt may start.
    /// Returns false when there was no error to clear.
    pub fn clear_error(&mut self) -> bool {
        if matches!(self.phase, FeedPhase::Error { .. }) {
            self.phase = FeedPhase::Idle;
            self.needs_redraw = true;
            true
        } else {
            false
        }
    }

    /// Switch to a different tag in the current category. No-op if already
    /// current.
    pub fn switch_tag(&mut self, tag: &str) -> bool {
        if self.cursor.tag == tag {
            return false;
        }
        let category = self.cursor.category;
        self.reset_feed(category, tag);
        true
    }

    /// Switch category, snapping the tag back to the reserved one.
    pub fn switch_category(&mut self, category: Category) -> bool {
        if self.cursor.category == category {
            return false;
        }
        self.reset_feed(category, RESERVED_TAG);
        self.selected_tag = self
            .tag_store
            .tags(category)
            .iter()
            .position(|t| t == RESERVED_TAG)
            .unwrap_or(0);
        true
    }

    /// Turn the feature gate on or off in memory (persistence is the
    /// caller's job). Disabling drops all feed state; enabling re-arms the
    /// trigger and leaves the caller to start the first load.
    pub fn apply_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            self.trigger.attach();
        } else {
            self.abort_feed_task();
            self.feed_generation = self.feed_generation.wrapping_add(1);
            self.cursor.loading = false;
            self.trigger.detach();
            self.items.clear();
            self.cover_states.clear();
            self.selected = 0;
            self.phase = FeedPhase::Idle;
        }
        self.needs_redraw = true;
    }

    fn abort_feed_task(&mut self) {
        if let Some(handle) = self.feed_handle.take() {
            handle.abort();
            tracing::debug!("Aborted in-flight feed load");
        }
    }

    // ========================================================================
    // Scroll Trigger
    // ========================================================================

    /// Feed the trigger one observation of how close the viewport sits to
    /// the end of the grid. Returns true when a load should start now.
    pub fn observe_scroll(&mut self, now: std::time::Instant) -> bool {
        if !self.enabled || !matches!(self.phase, FeedPhase::Idle) {
            return false;
        }
        let (first, height) = self.grid_window;
        let below = self.items.len().saturating_sub(first.saturating_add(height));
        let gap = below.min(u16::MAX as usize) as u16;
        self.trigger.observe(gap, &self.cursor, now)
    }

    // ========================================================================
    // Covers
    // ========================================================================

    /// Pick the next covers to resolve: pending items inside the viewport
    /// plus the lookahead band, capped by the in-flight budget. Cache hits
    /// and items without a cover URL settle immediately without a probe.
    pub fn next_cover_requests(&mut self) -> Vec<CoverRequest> {
        let mut requests = Vec::new();
        if self.items.is_empty() {
            return requests;
        }

        let (first, height) = self.grid_window;
        let span = height.saturating_add(self.cover_lookahead_rows as usize);

        for item in self.items.iter().skip(first).take(span) {
            if self.covers_inflight + requests.len() >= MAX_COVER_INFLIGHT {
                break;
            }
            if self.cover_states.get(&item.id) != Some(&CoverState::Pending) {
                continue;
            }
            let Some(url) = &item.cover_url else {
                self.cover_states
                    .insert(Arc::clone(&item.id), CoverState::Errored);
                self.needs_redraw = true;
                continue;
            };
            if let Some(outcome) = self.cover_cache.get(url) {
                let state = state_for_outcome(outcome);
                self.cover_states.insert(Arc::clone(&item.id), state);
                self.needs_redraw = true;
                continue;
            }
            self.cover_states
                .insert(Arc::clone(&item.id), CoverState::Resolving);
            requests.push(CoverRequest {
                item_id: Arc::clone(&item.id),
                source_url: Arc::clone(url),
            });
        }

        self.covers_inflight += requests.len();
        if !requests.is_empty() {
            self.needs_redraw = true;
        }
        requests
    }

    /// Fold a finished cover probe back in. The outcome is cached by URL
    /// even when the item has since been cleared by a feed reset, so the
    /// next visit to the same tag reuses it.
    pub fn apply_cover(&mut self, item_id: Arc<str>, source_url: Arc<str>, outcome: CoverOutcome) {
        self.covers_inflight = self.covers_inflight.saturating_sub(1);
        let state = state_for_outcome(&outcome);
        self.cover_cache.put(source_url, outcome);
        if let Some(slot) = self.cover_states.get_mut(&item_id) {
            *slot = state;
            self.needs_redraw = true;
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
            self.needs_redraw = true;
        }
    }

    pub fn select_prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.needs_redraw = true;
        }
    }

    pub fn select_page_down(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let step = self.grid_window.1.max(1);
        self.selected = (self.selected + step).min(self.items.len() - 1);
        self.needs_redraw = true;
    }

    pub fn select_page_up(&mut self) {
        let step = self.grid_window.1.max(1);
        self.selected = self.selected.saturating_sub(step);
        self.needs_redraw = true;
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
        self.needs_redraw = true;
    }

    pub fn select_last(&mut self) {
        if !self.items.is_empty() {
            self.selected = self.items.len() - 1;
            self.needs_redraw = true;
        }
    }

    pub fn tag_next(&mut self) {
        if self.selected_tag + 1 < self.current_tags().len() {
            self.selected_tag += 1;
            self.needs_redraw = true;
        }
    }

    pub fn tag_prev(&mut self) {
        if self.selected_tag > 0 {
            self.selected_tag -= 1;
            self.needs_redraw = true;
        }
    }

    /// Clamp selection indices to valid ranges.
    ///
    /// Call this after any operation that may shrink the item or tag lists,
    /// such as a feed reset or a tag deletion.
    pub fn clamp_selections(&mut self) {
        self.selected = if self.items.is_empty() {
            0
        } else {
            self.selected.min(self.items.len() - 1)
        };
        let tag_count = self.current_tags().len();
        self.selected_tag = if tag_count == 0 {
            0
        } else {
            self.selected_tag.min(tag_count - 1)
        };
    }

    // ========================================================================
    // Detail View
    // ========================================================================

    /// Enter detail view for the currently selected item.
    pub fn enter_detail(&mut self) -> bool {
        let Some(item) = self.items.get(self.selected).cloned() else {
            return false;
        };
        self.detail_item = Some(item);
        self.view = View::Detail;
        self.needs_redraw = true;
        true
    }

    /// Exit detail view back to browse.
    pub fn exit_detail(&mut self) {
        self.view = View::Browse;
        self.detail_item = None;
        self.needs_redraw = true;
    }

    // ========================================================================
    // Status Messages
    // ========================================================================

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
        self.needs_redraw = true;
    }

    /// Clear status message if expired (older than 3 seconds)
    /// Returns true if a message was actually cleared
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= 3 {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    /// Advance the spinner while anything is in flight. Returns true when a
    /// redraw is needed for the new frame.
    pub fn advance_spinner(&mut self) -> bool {
        if self.is_busy() {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
            true
        } else {
            false
        }
    }
}

fn state_for_outcome(outcome: &CoverOutcome) -> CoverState {
    match outcome {
        CoverOutcome::Resolved { url, .. } => CoverState::Resolved {
            url: Arc::clone(url),
        },
        CoverOutcome::Placeholder { .. } => CoverState::Errored,
    }
}

// ============================================================================
// Resource Cleanup
// ============================================================================

/// Abort the in-flight page task so it cannot outlive the event loop.
impl Drop for App {
    fn drop(&mut self) {
        if let Some(handle) = self.feed_handle.take() {
            handle.abort();
            tracing::debug!("Aborted feed load task on App drop");
        }
    }
}
