//! The recommendation feed pipeline.
//!
//! Everything between the remote endpoint and the UI lives here:
//!
//! - [`proxy`] - JSON fetch through the CORS-relay proxy chain
//! - [`loader`] - page requests, whole-chain retry, page decoding
//! - [`cursor`] - pagination state (offset, exhaustion, in-flight guard)
//! - [`trigger`] - the pure auto-load state machine fed by scroll observations
//! - [`covers`] - cover URL resolution with ordered fallback
//! - [`types`] - wire types and the scrubbed [`FeedItem`]
//!
//! # Flow
//!
//! ```ignore
//! use reel::douban::{FeedCursor, FeedLoader, Category};
//!
//! let mut cursor = FeedCursor::new(Category::Movie, "热门", 16);
//! if let Some(page) = loader.load_more(&mut cursor).await? {
//!     // page.items are scrubbed and ready to display;
//!     // cursor has advanced and knows whether the feed is exhausted
//! }
//! ```

mod covers;
mod cursor;
mod loader;
mod proxy;
mod trigger;
mod types;

pub use covers::{cover_candidates, CoverOutcome, CoverResolver, CoverState, COVER_PLACEHOLDER};
pub use cursor::{FeedCursor, DEFAULT_PAGE_SIZE};
pub use loader::{FeedLoader, FeedPage, LoadError, PageQuery, DEFAULT_MAX_RETRIES};
pub use proxy::{FetchError, ProxyClient, ProxyEndpoint, ProxyStyle};
pub use trigger::{ScrollTrigger, TriggerState, DEFAULT_THRESHOLD_ROWS};
pub use types::{Category, FeedItem, UNRATED};
