//! Shared utilities: terminal-safe text handling and URL validation.
//!
//! Everything user-visible in the card list originates from a remote feed,
//! so text is scrubbed of control/escape sequences before rendering and
//! remote URLs are validated before the HTTP client or the system browser
//! ever sees them.
//!
//! # Examples
//!
//! ```
//! use reel::util::{scrub_text, fit_to_width, validate_remote_url};
//!
//! let title = scrub_text("肖申克的救赎\u{1b}[31m");
//! let clipped = fit_to_width(&title, 20);
//! let url = validate_remote_url("https://movie.douban.com/subject/1292052/").unwrap();
//! # let _ = (clipped, url);
//! ```

mod text;
mod urls;

pub use text::{display_width, fit_to_width, scrub_text};
pub use urls::{validate_remote_url, UrlError};
