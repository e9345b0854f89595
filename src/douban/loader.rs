//! Page loading on top of the proxy chain.
//!
//! A page request is retried as a whole: one attempt walks the entire proxy
//! chain, and only when the chain is exhausted does the loader back off
//! (1 s, then 2 s) and try again. Cursor movement is strictly
//! success-driven; a failed page leaves the cursor where it was so a retry
//! asks for the same window.

use std::time::Duration;

use thiserror::Error;

use crate::douban::cursor::FeedCursor;
use crate::douban::proxy::{FetchError, ProxyClient};
use crate::douban::types::{Category, FeedItem, SubjectsPage};

/// Extra whole-chain attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Everything needed to address one page of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub category: Category,
    pub tag: String,
    pub page_size: u32,
    pub offset: u32,
}

impl PageQuery {
    pub fn from_cursor(cursor: &FeedCursor) -> Self {
        PageQuery {
            category: cursor.category,
            tag: cursor.tag.clone(),
            page_size: cursor.page_size,
            offset: cursor.offset,
        }
    }

    /// Upstream URL for this page (before any proxy wrapping).
    pub fn endpoint_url(&self, api_base: &str) -> String {
        format!(
            "{}/j/search_subjects?type={}&tag={}&sort=recommend&page_limit={}&page_start={}",
            api_base.trim_end_matches('/'),
            self.category.endpoint_type(),
            urlencoding::encode(&self.tag),
            self.page_size,
            self.offset,
        )
    }
}

/// One decoded, scrubbed page.
#[derive(Debug)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    /// Raw subject count as returned by the endpoint, including entries that
    /// were skipped as malformed. Cursor movement uses this, not `items.len()`,
    /// so local skips never look like the end of the feed.
    pub fetched: u32,
    /// True when the endpoint returned fewer subjects than requested.
    pub is_last: bool,
    pub skipped: usize,
}

/// A page load that failed even after retries.
#[derive(Debug, Error)]
#[error("feed request failed after {attempts} attempts: {source}")]
pub struct LoadError {
    pub attempts: u32,
    #[source]
    pub source: FetchError,
}

/// Fetches and decodes recommendation pages.
#[derive(Debug, Clone)]
pub struct FeedLoader {
    proxy: ProxyClient,
    api_base: String,
    max_retries: u32,
}

impl FeedLoader {
    pub fn new(proxy: ProxyClient, api_base: impl Into<String>, max_retries: u32) -> Self {
        FeedLoader {
            proxy,
            api_base: api_base.into(),
            max_retries,
        }
    }

    /// Fetch one page, retrying the whole proxy chain with backoff.
    pub async fn load_page(&self, query: &PageQuery) -> Result<FeedPage, LoadError> {
        let url = query.endpoint_url(&self.api_base);
        let mut retry = 0u32;

        loop {
            match self.proxy.fetch_json::<SubjectsPage>(&url).await {
                Ok(page) => {
                    if retry > 0 {
                        tracing::info!(retry, offset = query.offset, "Feed page fetched after retry");
                    }
                    return Ok(assemble_page(query, page));
                }
                Err(error) => {
                    if retry >= self.max_retries {
                        tracing::error!(
                            error = %error,
                            offset = query.offset,
                            tag = %query.tag,
                            "Feed page failed after all retries"
                        );
                        return Err(LoadError {
                            attempts: retry + 1,
                            source: error,
                        });
                    }
                    let delay_secs = 1u64 << retry;
                    tracing::warn!(
                        error = %error,
                        retry_in_secs = delay_secs,
                        offset = query.offset,
                        "Feed page fetch failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                    retry += 1;
                }
            }
        }
    }

    /// Load the next page for `cursor`, advancing it only on success.
    ///
    /// Returns `Ok(None)` without touching the network when the cursor is
    /// already loading or exhausted, which is what makes repeated load-more
    /// requests safe. The `loading` flag is always cleared on the way out.
    pub async fn load_more(&self, cursor: &mut FeedCursor) -> Result<Option<FeedPage>, LoadError> {
        if !cursor.can_load_more() {
            tracing::debug!(
                loading = cursor.loading,
                exhausted = cursor.exhausted,
                "Load-more skipped"
            );
            return Ok(None);
        }

        cursor.loading = true;
        let query = PageQuery::from_cursor(cursor);
        let result = self.load_page(&query).await;
        cursor.loading = false;

        match result {
            Ok(page) => {
                cursor.advance(page.fetched);
                Ok(Some(page))
            }
            Err(error) => Err(error),
        }
    }
}

fn assemble_page(query: &PageQuery, page: SubjectsPage) -> FeedPage {
    let fetched = page.subjects.len() as u32;
    let mut items = Vec::with_capacity(page.subjects.len());
    let mut skipped = 0usize;

    for raw in page.subjects {
        match FeedItem::from_raw(raw) {
            Some(item) => items.push(item),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, offset = query.offset, "Skipped malformed subjects");
    }

    FeedPage {
        items,
        fetched,
        is_last: fetched < query.page_size,
        skipped,
    }
}
