//! Wire types for the recommendation endpoint and the cleaned-up item type
//! the rest of the application consumes.
//!
//! Everything in a [`RawSubject`] is untrusted: text fields are scrubbed and
//! URLs validated here, at the decode boundary, so downstream code never has
//! to reason about hostile input.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::util::{scrub_text, validate_remote_url};

/// Feed category, selecting which half of the endpoint to page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Movie,
    Tv,
}

impl Category {
    /// Value of the `type` query parameter.
    pub fn endpoint_type(self) -> &'static str {
        match self {
            Category::Movie => "movie",
            Category::Tv => "tv",
        }
    }

    /// Parse the persisted form ("movie"/"tv").
    pub fn from_setting(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Category::Movie),
            "tv" => Some(Category::Tv),
            _ => None,
        }
    }

    /// Persisted form; deliberately the same string as the endpoint type.
    pub fn as_setting(self) -> &'static str {
        self.endpoint_type()
    }

    pub fn other(self) -> Self {
        match self {
            Category::Movie => Category::Tv,
            Category::Tv => Category::Movie,
        }
    }

    /// Panel label for the UI.
    pub fn label(self) -> &'static str {
        match self {
            Category::Movie => "Movies",
            Category::Tv => "TV Shows",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint_type())
    }
}

/// Response body of `/j/search_subjects`.
///
/// A missing or empty `subjects` array is how the endpoint signals the end
/// of the feed, so it must decode cleanly rather than error.
#[derive(Debug, Deserialize)]
pub(crate) struct SubjectsPage {
    #[serde(default)]
    pub subjects: Vec<RawSubject>,
}

/// One subject as the endpoint ships it.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSubject {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub rate: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub is_new: Option<bool>,
    #[serde(default)]
    pub episodes_info: Option<String>,
}

/// Rating shown when the endpoint sends an empty `rate`.
pub const UNRATED: &str = "N/A";

/// A scrubbed, validated feed entry.
#[derive(Debug, Clone)]
pub struct FeedItem {
    /// Endpoint id when present, otherwise derived from the detail URL.
    pub id: Arc<str>,
    pub title: Arc<str>,
    pub rating: Arc<str>,
    /// Absent when the subject had no usable cover URL.
    pub cover_url: Option<Arc<str>>,
    pub detail_url: Arc<str>,
    pub is_new: bool,
    pub episode_info: Option<Arc<str>>,
}

impl FeedItem {
    /// Converts a raw subject, returning `None` for entries too malformed to
    /// display (no title, or no valid detail URL). Callers count those as
    /// skipped rather than failing the page.
    pub(crate) fn from_raw(raw: RawSubject) -> Option<Self> {
        let title = scrub_text(&raw.title);
        let title = title.trim();
        if title.is_empty() {
            return None;
        }

        let detail_url = raw.url.trim();
        if validate_remote_url(detail_url).is_err() {
            return None;
        }

        let rating = scrub_text(&raw.rate);
        let rating = rating.trim();
        let rating: Arc<str> = if rating.is_empty() {
            Arc::from(UNRATED)
        } else {
            Arc::from(rating)
        };

        let cover_url = {
            let cover = raw.cover.trim();
            if cover.is_empty() || validate_remote_url(cover).is_err() {
                None
            } else {
                Some(Arc::from(cover))
            }
        };

        let id: Arc<str> = match raw.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Arc::from(id),
            _ => Arc::from(derived_id(detail_url)),
        };

        let episode_info = raw.episodes_info.as_deref().and_then(|info| {
            let info = scrub_text(info);
            let info = info.trim();
            if info.is_empty() {
                None
            } else {
                Some(Arc::from(info))
            }
        });

        Some(FeedItem {
            id,
            title: Arc::from(title),
            rating,
            cover_url,
            detail_url: Arc::from(detail_url),
            is_new: raw.is_new.unwrap_or(false),
            episode_info,
        })
    }
}

/// Stable identity for subjects the endpoint ships without an id: first 16
/// hex chars of the SHA-256 of the detail URL.
fn derived_id(detail_url: &str) -> String {
    let digest = Sha256::digest(detail_url.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(16);
    hex
}
