//! JSON fetch through a chain of CORS-relay-style proxies.
//!
//! The recommendation endpoint is reached by handing the full upstream URL,
//! percent-encoded, to a relay: `GET {relay_base}{encoded_upstream_url}`.
//! Relays differ in how they ship the upstream body back, captured by
//! [`ProxyStyle`]. One fetch walks the configured endpoint list in order and
//! returns the first success; when every endpoint fails the caller gets
//! [`FetchError::Exhausted`] wrapping the last underlying error. There is no
//! per-endpoint retry; retrying the whole chain is the loader's job.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Hard cap on relay response bodies. Feed pages are a few KiB; anything
/// near this size is a misbehaving relay.
pub const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024;

/// How a relay returns the upstream body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyStyle {
    /// Upstream body verbatim.
    #[default]
    Wrap,
    /// `{"contents": "<upstream body as a JSON string>"}` (the allorigins
    /// convention), requiring a second decode of the inner string.
    Envelope,
}

/// One relay endpoint: a URL prefix the encoded upstream URL is appended to.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEndpoint {
    pub base: String,
    #[serde(default)]
    pub style: ProxyStyle,
}

impl ProxyEndpoint {
    pub fn wrap(base: impl Into<String>) -> Self {
        ProxyEndpoint {
            base: base.into(),
            style: ProxyStyle::Wrap,
        }
    }

    pub fn envelope(base: impl Into<String>) -> Self {
        ProxyEndpoint {
            base: base.into(),
            style: ProxyStyle::Envelope,
        }
    }
}

/// Transport-level failures for a proxied fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("response larger than {} bytes", MAX_RESPONSE_SIZE)]
    TooLarge,
    #[error("undecodable response: {0}")]
    Decode(String),
    #[error("no proxy endpoints configured")]
    NoEndpoints,
    #[error("all {attempts} proxy attempts failed, last: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<FetchError>,
    },
}

/// The allorigins-style wrapper body.
#[derive(Deserialize)]
struct RelayEnvelope {
    contents: String,
}

/// HTTP client that speaks to the upstream endpoint through relays.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    /// Primary endpoint first, fallbacks in declared order.
    endpoints: Vec<ProxyEndpoint>,
    timeout: Duration,
    referer: String,
    auth_token: Option<SecretString>,
}

impl ProxyClient {
    pub fn new(
        http: reqwest::Client,
        endpoints: Vec<ProxyEndpoint>,
        timeout: Duration,
        referer: impl Into<String>,
        auth_token: Option<SecretString>,
    ) -> Self {
        ProxyClient {
            http,
            endpoints,
            timeout,
            referer: referer.into(),
            auth_token,
        }
    }

    /// Fetch `target_url` through the proxy chain and decode its JSON body.
    ///
    /// Timeout, connect failure, non-2xx status, oversize, and undecodable
    /// bodies all advance to the next endpoint.
    pub async fn fetch_json<T: DeserializeOwned>(&self, target_url: &str) -> Result<T, FetchError> {
        let total = self.endpoints.len();
        let mut last_error = None;

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            match self.attempt::<T>(endpoint, target_url).await {
                Ok(value) => {
                    if index > 0 {
                        tracing::debug!(proxy = %endpoint.base, index, "Fetched via fallback proxy");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    tracing::warn!(
                        proxy = %endpoint.base,
                        attempt = index + 1,
                        total,
                        error = %error,
                        "Proxy attempt failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(last) => Err(FetchError::Exhausted {
                attempts: total,
                last: Box::new(last),
            }),
            None => Err(FetchError::NoEndpoints),
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        endpoint: &ProxyEndpoint,
        target_url: &str,
    ) -> Result<T, FetchError> {
        let relay_url = self.relay_url(endpoint, target_url);

        let request = self
            .http
            .get(&relay_url)
            .header(header::ACCEPT, "application/json")
            .header(header::REFERER, self.referer.as_str());

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = read_limited(response).await?;

        match endpoint.style {
            ProxyStyle::Wrap => {
                serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
            }
            ProxyStyle::Envelope => {
                let envelope: RelayEnvelope =
                    serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
                serde_json::from_str(&envelope.contents)
                    .map_err(|e| FetchError::Decode(e.to_string()))
            }
        }
    }

    /// Build the relay request URL: base + percent-encoded upstream URL,
    /// plus the auth token as a query parameter when one is configured.
    fn relay_url(&self, endpoint: &ProxyEndpoint, target_url: &str) -> String {
        let mut url = format!("{}{}", endpoint.base, urlencoding::encode(target_url));
        if let Some(token) = &self.auth_token {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str("auth=");
            url.push_str(&urlencoding::encode(token.expose_secret()));
        }
        url
    }
}

/// Read a response body, refusing anything over [`MAX_RESPONSE_SIZE`].
///
/// Checks Content-Length first when the relay sends one, then enforces the
/// cap while streaming for relays that send chunked bodies.
async fn read_limited(response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
    if let Some(length) = response.content_length() {
        if length > MAX_RESPONSE_SIZE as u64 {
            return Err(FetchError::TooLarge);
        }
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if body.len().saturating_add(chunk.len()) > MAX_RESPONSE_SIZE {
            return Err(FetchError::TooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
