//! Cover image resolution with ordered fallback.
//!
//! Terminals don't render the JPEG, but the detail view and the card list
//! still want to know whether a cover exists and which URL actually serves
//! it (the original host frequently refuses hotlinked requests, the proxied
//! rewrite usually works). Each item gets an ordered candidate list; the
//! resolver probes candidates until one answers, and after the last remote
//! candidate fails the item settles on the built-in placeholder for good.
//! A settled cover is never probed again.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header;

/// Inline SVG shown when no remote cover is reachable.
pub const COVER_PLACEHOLDER: &str = "data:image/svg+xml,%3Csvg%20xmlns='http://www.w3.org/2000/svg'%20width='120'%20height='180'%3E%3Crect%20width='120'%20height='180'%20fill='%23222'/%3E%3C/svg%3E";

/// Where one item's cover currently stands. Tracked per item by the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverState {
    /// Not probed yet (outside the lazy-resolution window).
    Pending,
    /// A probe task is in flight.
    Resolving,
    /// A remote candidate answered; this URL serves the cover.
    Resolved { url: Arc<str> },
    /// All remote candidates failed (or none existed); placeholder is final.
    Errored,
}

/// Result of probing one candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverOutcome {
    Resolved { url: Arc<str>, attempts: usize },
    Placeholder { attempts: usize },
}

/// Ordered candidates for an item: original URL, proxy rewrite, placeholder.
///
/// Items without a usable cover URL get only the placeholder.
pub fn cover_candidates(cover_url: Option<&str>, proxy_base: &str) -> Vec<String> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(url) = cover_url {
        candidates.push(url.to_string());
        candidates.push(format!("{}{}", proxy_base, urlencoding::encode(url)));
    }
    candidates.push(COVER_PLACEHOLDER.to_string());
    candidates
}

/// Probes cover candidates without downloading image bodies.
#[derive(Debug, Clone)]
pub struct CoverResolver {
    http: reqwest::Client,
    timeout: Duration,
}

impl CoverResolver {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        CoverResolver { http, timeout }
    }

    /// Walk `candidates` in order and return the first that serves an image.
    ///
    /// The placeholder data URI terminates the walk without a probe, so the
    /// number of network attempts is bounded by the remote candidate count.
    pub async fn resolve(&self, candidates: &[String]) -> CoverOutcome {
        let mut attempts = 0usize;

        for candidate in candidates {
            if candidate.starts_with("data:") {
                return CoverOutcome::Placeholder { attempts };
            }

            attempts += 1;
            match self.probe(candidate).await {
                Ok(()) => {
                    return CoverOutcome::Resolved {
                        url: Arc::from(candidate.as_str()),
                        attempts,
                    }
                }
                Err(reason) => {
                    tracing::debug!(candidate = %candidate, %reason, "Cover candidate failed");
                }
            }
        }

        CoverOutcome::Placeholder { attempts }
    }

    /// One candidate check: 2xx status and an image-ish Content-Type.
    /// Headers suffice; the body is never read.
    async fn probe(&self, url: &str) -> Result<(), String> {
        let response = tokio::time::timeout(self.timeout, self.http.get(url).send())
            .await
            .map_err(|_| "timeout".to_string())?
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {}", status.as_u16()));
        }

        match response.headers().get(header::CONTENT_TYPE) {
            Some(value) => {
                let is_image = value
                    .to_str()
                    .map(|v| v.trim_start().starts_with("image/"))
                    .unwrap_or(false);
                if is_image {
                    Ok(())
                } else {
                    Err(format!("content type {:?}", value))
                }
            }
            // Some relays strip the header; trust the status in that case
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver() -> CoverResolver {
        CoverResolver::new(reqwest::Client::new(), Duration::from_millis(400))
    }

    fn image_response() -> ResponseTemplate {
        ResponseTemplate::new(200).insert_header("content-type", "image/jpeg")
    }

    #[test]
    fn candidates_are_ordered_original_proxied_placeholder() {
        let candidates = cover_candidates(
            Some("https://img1.doubanio.com/view/photo/p1.jpg"),
            "https://relay.example/p?u=",
        );
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0], "https://img1.doubanio.com/view/photo/p1.jpg");
        assert_eq!(
            candidates[1],
            "https://relay.example/p?u=https%3A%2F%2Fimg1.doubanio.com%2Fview%2Fphoto%2Fp1.jpg"
        );
        assert!(candidates[2].starts_with("data:image/svg+xml"));
    }

    #[test]
    fn missing_cover_gets_placeholder_only() {
        let candidates = cover_candidates(None, "https://relay.example/p?u=");
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].starts_with("data:"));
    }

    #[tokio::test]
    async fn first_working_candidate_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/direct.jpg"))
            .respond_with(image_response())
            .expect(1)
            .mount(&server)
            .await;

        let candidates = vec![
            format!("{}/direct.jpg", server.uri()),
            format!("{}/proxied.jpg", server.uri()),
            COVER_PLACEHOLDER.to_string(),
        ];
        let outcome = resolver().resolve(&candidates).await;
        match outcome {
            CoverOutcome::Resolved { url, attempts } => {
                assert!(url.ends_with("/direct.jpg"));
                assert_eq!(attempts, 1);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_failures_settle_on_third_candidate_with_no_extra_probes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.jpg"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/c.jpg"))
            .respond_with(image_response())
            .expect(1)
            .mount(&server)
            .await;

        let candidates = vec![
            format!("{}/a.jpg", server.uri()),
            format!("{}/b.jpg", server.uri()),
            format!("{}/c.jpg", server.uri()),
        ];
        let outcome = resolver().resolve(&candidates).await;
        match outcome {
            CoverOutcome::Resolved { url, attempts } => {
                assert!(url.ends_with("/c.jpg"));
                assert_eq!(attempts, 3);
            }
            other => panic!("expected Resolved, got {other:?}"),
        }
        // MockServer verifies the expect(1) counts on drop: each candidate
        // was probed exactly once and nothing ran after the success.
    }

    #[tokio::test]
    async fn all_remote_failures_settle_on_placeholder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(2)
            .mount(&server)
            .await;

        let candidates = vec![
            format!("{}/x.jpg", server.uri()),
            format!("{}/y.jpg", server.uri()),
            COVER_PLACEHOLDER.to_string(),
        ];
        let outcome = resolver().resolve(&candidates).await;
        assert_eq!(outcome, CoverOutcome::Placeholder { attempts: 2 });
    }

    #[tokio::test]
    async fn placeholder_only_list_needs_no_network() {
        let outcome = resolver()
            .resolve(&[COVER_PLACEHOLDER.to_string()])
            .await;
        assert_eq!(outcome, CoverOutcome::Placeholder { attempts: 0 });
    }

    #[tokio::test]
    async fn non_image_content_type_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/block.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>hotlink blocked</html>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/real.jpg"))
            .respond_with(image_response())
            .mount(&server)
            .await;

        let candidates = vec![
            format!("{}/block.html", server.uri()),
            format!("{}/real.jpg", server.uri()),
        ];
        let outcome = resolver().resolve(&candidates).await;
        assert!(matches!(outcome, CoverOutcome::Resolved { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn unresponsive_host_times_out_and_falls_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hang.jpg"))
            .respond_with(image_response().set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quick.jpg"))
            .respond_with(image_response())
            .mount(&server)
            .await;

        let candidates = vec![
            format!("{}/hang.jpg", server.uri()),
            format!("{}/quick.jpg", server.uri()),
        ];
        let outcome = resolver().resolve(&candidates).await;
        assert!(matches!(outcome, CoverOutcome::Resolved { attempts: 2, .. }));
    }
}
