//! Pagination state for the recommendation feed.
//!
//! One cursor describes one scrollable feed: which category and tag it pages,
//! how far it has advanced, and whether more data can be requested. The
//! `loading` flag is the at-most-one-in-flight guard: it is checked and set
//! before a page task is spawned and cleared when the result (success or
//! failure) is applied.

use crate::douban::types::Category;

/// Items requested per page. The endpoint serves 16-18 comfortably.
pub const DEFAULT_PAGE_SIZE: u32 = 16;

/// `rotate` wraps back to offset 0 after this many pages, matching the
/// endpoint's practical depth for the recommend sort.
const ROTATE_WINDOW_PAGES: u32 = 9;

#[derive(Debug, Clone)]
pub struct FeedCursor {
    pub category: Category,
    pub tag: String,
    pub page_size: u32,
    pub offset: u32,
    /// Set when a page came back short; only `reset`/`rotate` clear it.
    pub exhausted: bool,
    /// True while a page request for this cursor is in flight.
    pub loading: bool,
}

impl FeedCursor {
    pub fn new(category: Category, tag: impl Into<String>, page_size: u32) -> Self {
        FeedCursor {
            category,
            tag: tag.into(),
            // page_size 0 would mark every page short and kill the feed
            page_size: page_size.max(1),
            offset: 0,
            exhausted: false,
            loading: false,
        }
    }

    /// Rewind to the start of a (possibly different) category/tag feed.
    pub fn reset(&mut self, category: Category, tag: impl Into<String>) {
        self.category = category;
        self.tag = tag.into();
        self.offset = 0;
        self.exhausted = false;
        self.loading = false;
    }

    /// Record a successfully applied page of `fetched` raw subjects.
    ///
    /// A short page (including zero items) marks the feed exhausted. Never
    /// called for failed loads, so a failure leaves the window unchanged and
    /// a retry re-requests the same offset.
    pub fn advance(&mut self, fetched: u32) {
        self.offset = self.offset.saturating_add(fetched);
        if fetched < self.page_size {
            self.exhausted = true;
        }
    }

    pub fn can_load_more(&self) -> bool {
        !self.loading && !self.exhausted
    }

    /// Jump one page forward for a fresh batch, wrapping to the start once
    /// the window runs past the useful depth of the feed.
    pub fn rotate(&mut self) {
        self.offset = self.offset.saturating_add(self.page_size);
        if self.offset > ROTATE_WINDOW_PAGES * self.page_size {
            self.offset = 0;
        }
        self.exhausted = false;
    }
}
