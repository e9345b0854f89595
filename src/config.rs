//! Configuration file parser for ~/.config/reel/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::douban::{ProxyEndpoint, DEFAULT_MAX_RETRIES, DEFAULT_PAGE_SIZE, DEFAULT_THRESHOLD_ROWS};

/// Environment variable that overrides the config-file proxy token.
pub const PROXY_TOKEN_ENV: &str = "REEL_PROXY_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// Custom Debug impl masks `proxy_auth_token` to prevent secret leakage in
/// logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream origin the feed endpoint lives on.
    pub api_base: String,

    /// Referer header sent on proxied requests.
    pub referer: String,

    /// Items requested per feed page.
    pub page_size: u32,

    /// Client-side timeout per proxy attempt, in seconds.
    pub request_timeout_secs: u64,

    /// Whole-chain retries after the first failed load (0 = fail fast).
    pub max_retries: u32,

    /// Primary relay endpoint.
    pub proxy: ProxyEndpoint,

    /// Fallback relays tried in order when the primary fails.
    pub fallback_proxies: Vec<ProxyEndpoint>,

    /// Whether scrolling near the end of the grid loads the next page.
    pub auto_load: bool,

    /// How close to the end (in grid rows) scrolling must get before the
    /// next page is requested.
    pub scroll_threshold_rows: u16,

    /// How many rows past the viewport get their covers resolved eagerly.
    pub cover_lookahead_rows: u16,

    /// Token appended as `auth=` to relay URLs, for self-hosted relays that
    /// require one (alternative to the REEL_PROXY_TOKEN env var).
    /// Env var takes precedence over config file.
    pub proxy_auth_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "https://movie.douban.com".to_string(),
            referer: "https://movie.douban.com/".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 10,
            max_retries: DEFAULT_MAX_RETRIES,
            proxy: ProxyEndpoint::wrap("https://api.codetabs.com/v1/proxy?quest="),
            fallback_proxies: vec![
                ProxyEndpoint::envelope("https://api.allorigins.win/get?url="),
                ProxyEndpoint::wrap("https://corsproxy.io/?"),
            ],
            auto_load: true,
            scroll_threshold_rows: DEFAULT_THRESHOLD_ROWS,
            cover_lookahead_rows: 8,
            proxy_auth_token: None,
        }
    }
}

/// Mask proxy_auth_token in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base", &self.api_base)
            .field("referer", &self.referer)
            .field("page_size", &self.page_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("proxy", &self.proxy)
            .field("fallback_proxies", &self.fallback_proxies)
            .field("auto_load", &self.auto_load)
            .field("scroll_threshold_rows", &self.scroll_threshold_rows)
            .field("cover_lookahead_rows", &self.cover_lookahead_rows)
            .field(
                "proxy_auth_token",
                &self.proxy_auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion from a
        // maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {} // Size is within limits, proceed
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "api_base",
                "referer",
                "page_size",
                "request_timeout_secs",
                "max_retries",
                "proxy",
                "fallback_proxies",
                "auto_load",
                "scroll_threshold_rows",
                "cover_lookahead_rows",
                "proxy_auth_token",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), api_base = %config.api_base, "Loaded configuration");
        Ok(config)
    }

    /// Per-attempt request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Full relay chain: primary first, then fallbacks in declared order.
    pub fn proxy_endpoints(&self) -> Vec<ProxyEndpoint> {
        let mut endpoints = Vec::with_capacity(1 + self.fallback_proxies.len());
        endpoints.push(self.proxy.clone());
        endpoints.extend(self.fallback_proxies.iter().cloned());
        endpoints
    }

    /// The relay auth token, if any. The environment variable wins over the
    /// config file; empty values count as unset.
    pub fn proxy_auth_token(&self) -> Option<SecretString> {
        Self::resolve_token(
            std::env::var(PROXY_TOKEN_ENV).ok(),
            self.proxy_auth_token.as_deref(),
        )
    }

    fn resolve_token(
        env_token: Option<String>,
        config_token: Option<&str>,
    ) -> Option<SecretString> {
        env_token
            .filter(|t| !t.is_empty())
            .or_else(|| config_token.filter(|t| !t.is_empty()).map(String::from))
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::douban::ProxyStyle;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base, "https://movie.douban.com");
        assert_eq!(config.page_size, 16);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.fallback_proxies.len(), 2);
        assert!(config.auto_load);
        assert_eq!(config.scroll_threshold_rows, 4);
        assert_eq!(config.cover_lookahead_rows, 8);
        assert!(config.proxy_auth_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/reel_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.page_size, 16);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("reel_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_base, "https://movie.douban.com");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("reel_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "page_size = 18\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 18);
        assert_eq!(config.request_timeout_secs, 10); // default
        assert!(config.auto_load); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("reel_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
api_base = "https://example.com"
referer = "https://example.com/"
page_size = 20
request_timeout_secs = 5
max_retries = 1
auto_load = false
scroll_threshold_rows = 2
cover_lookahead_rows = 4
proxy_auth_token = "test-token-123"

[proxy]
base = "https://relay.example/get?u="
style = "envelope"

[[fallback_proxies]]
base = "https://other.example/?"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_base, "https://example.com");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.max_retries, 1);
        assert!(!config.auto_load);
        assert_eq!(config.scroll_threshold_rows, 2);
        assert_eq!(config.cover_lookahead_rows, 4);
        assert_eq!(config.proxy_auth_token.as_deref(), Some("test-token-123"));
        assert_eq!(config.proxy.base, "https://relay.example/get?u=");
        assert_eq!(config.proxy.style, ProxyStyle::Envelope);
        assert_eq!(config.fallback_proxies.len(), 1);
        // style defaults to wrap when omitted
        assert_eq!(config.fallback_proxies[0].style, ProxyStyle::Wrap);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("reel_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        // Verify error message contains useful info
        let msg = err.to_string();
        assert!(msg.contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("reel_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
page_size = 16
totally_fake_key = "should not fail"
another_unknown = 42
"#;
        std::fs::write(&path, content).unwrap();

        // Should succeed (unknown keys ignored)
        let config = Config::load(&path).unwrap();
        assert_eq!(config.page_size, 16);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("reel_config_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        // page_size should be an integer, not a string
        std::fs::write(&path, "page_size = \"lots\"\n").unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("reel_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        // Write a file just over 1MB
        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_proxy_endpoints_order() {
        let config = Config::default();
        let endpoints = config.proxy_endpoints();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].base, config.proxy.base);
        assert_eq!(endpoints[1].base, config.fallback_proxies[0].base);
    }

    #[test]
    fn test_resolve_token_env_wins() {
        let token = Config::resolve_token(Some("from-env".to_string()), Some("from-file"));
        assert_eq!(token.unwrap().expose_secret(), "from-env");
    }

    #[test]
    fn test_resolve_token_falls_back_to_config() {
        let token = Config::resolve_token(None, Some("from-file"));
        assert_eq!(token.unwrap().expose_secret(), "from-file");
    }

    #[test]
    fn test_resolve_token_empty_counts_as_unset() {
        let token = Config::resolve_token(Some(String::new()), Some("from-file"));
        assert_eq!(token.unwrap().expose_secret(), "from-file");

        assert!(Config::resolve_token(Some(String::new()), Some("")).is_none());
        assert!(Config::resolve_token(None, None).is_none());
    }

    // Debug output masks the relay token
    #[test]
    fn test_debug_masks_token() {
        let mut config = Config::default();
        config.proxy_auth_token = Some("super-secret-token-12345".to_string());

        let debug_output = format!("{:?}", config);
        assert!(
            !debug_output.contains("super-secret-token-12345"),
            "Debug output should not contain the token"
        );
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should show [REDACTED] for the token"
        );
    }

    #[test]
    fn test_debug_shows_none_when_no_token() {
        let config = Config::default();
        let debug_output = format!("{:?}", config);
        assert!(
            debug_output.contains("None"),
            "Debug output should show None when no token is set"
        );
        assert!(
            !debug_output.contains("[REDACTED]"),
            "Debug output should not show [REDACTED] when no token"
        );
    }
}
