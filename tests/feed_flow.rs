//! Integration tests for the feed pipeline: relay chain, paging, retry.
//!
//! Each test stands up its own wiremock relay and drives a real
//! loader/cursor pair the way the application does, asserting on both the
//! decoded pages and the requests that actually left the client.

use std::time::Duration;

use pretty_assertions::assert_eq;
use reel::douban::{Category, FeedCursor, FeedLoader, PageQuery, ProxyClient, ProxyEndpoint};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chain_loader(endpoints: Vec<ProxyEndpoint>, max_retries: u32) -> FeedLoader {
    let proxy = ProxyClient::new(
        reqwest::Client::new(),
        endpoints,
        Duration::from_millis(400),
        "https://movie.douban.com/",
        None,
    );
    FeedLoader::new(proxy, "https://movie.douban.com", max_retries)
}

fn relay_loader(server: &MockServer, max_retries: u32) -> FeedLoader {
    chain_loader(
        vec![ProxyEndpoint::wrap(format!("{}/relay?u=", server.uri()))],
        max_retries,
    )
}

/// The exact upstream URL the relay should be asked for.
fn upstream_url(category: Category, tag: &str, offset: u32) -> String {
    PageQuery {
        category,
        tag: tag.to_string(),
        page_size: 16,
        offset,
    }
    .endpoint_url("https://movie.douban.com")
}

fn subjects(count: usize) -> Value {
    let subjects: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "title": format!("片名{i}"),
                "rate": "7.9",
                "cover": format!("https://img9.doubanio.com/view/photo/p{i}.jpg"),
                "url": format!("https://movie.douban.com/subject/{i}/"),
                "id": format!("{i}"),
            })
        })
        .collect();
    json!({ "subjects": subjects })
}

// ============================================================================
// Paging
// ============================================================================

#[tokio::test]
async fn full_session_walks_offsets_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param(
            "u",
            upstream_url(Category::Movie, "热门", 0).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(subjects(16)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param(
            "u",
            upstream_url(Category::Movie, "热门", 16).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(subjects(10)))
        .expect(1)
        .mount(&server)
        .await;

    let loader = relay_loader(&server, 0);
    let mut cursor = FeedCursor::new(Category::Movie, "热门", 16);

    let first = loader.load_more(&mut cursor).await.unwrap().unwrap();
    assert_eq!(first.items.len(), 16);
    assert!(!first.is_last);
    assert_eq!(cursor.offset, 16);
    assert!(!cursor.exhausted);

    let second = loader.load_more(&mut cursor).await.unwrap().unwrap();
    assert_eq!(second.items.len(), 10);
    assert!(second.is_last);
    assert_eq!(cursor.offset, 26);
    assert!(cursor.exhausted);

    // Exhausted: no further request leaves the process
    assert!(loader.load_more(&mut cursor).await.unwrap().is_none());
    assert_eq!(cursor.offset, 26);
}

#[tokio::test]
async fn malformed_subjects_do_not_shrink_the_window() {
    let server = MockServer::start().await;
    let mut body = subjects(16);
    body["subjects"][3]["url"] = json!("javascript:alert(1)");
    body["subjects"][7]["title"] = json!("");
    Mock::given(method("GET"))
        .and(path("/relay"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let loader = relay_loader(&server, 0);
    let mut cursor = FeedCursor::new(Category::Movie, "热门", 16);
    let page = loader.load_more(&mut cursor).await.unwrap().unwrap();

    assert_eq!(page.fetched, 16);
    assert_eq!(page.items.len(), 14);
    assert_eq!(page.skipped, 2);
    // The cursor moves by the raw subject count, so two locally dropped
    // entries do not shift the next window or fake an end-of-feed
    assert_eq!(cursor.offset, 16);
    assert!(!cursor.exhausted);
}

// ============================================================================
// Failure and Retry
// ============================================================================

#[tokio::test]
async fn failed_page_leaves_the_window_for_the_next_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param(
            "u",
            upstream_url(Category::Movie, "热门", 0).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(subjects(16)))
        .expect(1)
        .mount(&server)
        .await;
    // The second page fails once, then recovers
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param(
            "u",
            upstream_url(Category::Movie, "热门", 16).as_str(),
        ))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param(
            "u",
            upstream_url(Category::Movie, "热门", 16).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(subjects(16)))
        .expect(1)
        .mount(&server)
        .await;

    let loader = relay_loader(&server, 0);
    let mut cursor = FeedCursor::new(Category::Movie, "热门", 16);
    loader.load_more(&mut cursor).await.unwrap();

    let error = loader.load_more(&mut cursor).await.unwrap_err();
    assert_eq!(error.attempts, 1);
    assert_eq!(cursor.offset, 16);
    assert!(!cursor.exhausted);
    assert!(cursor.can_load_more());

    // The next attempt re-requests offset 16; anything else would miss the
    // mocks above and fail
    let page = loader.load_more(&mut cursor).await.unwrap().unwrap();
    assert_eq!(page.items.len(), 16);
    assert_eq!(cursor.offset, 32);
}

#[tokio::test]
async fn retry_restarts_the_chain_at_the_primary() {
    let server = MockServer::start().await;
    // Primary: fails the first pass, serves the second
    Mock::given(method("GET"))
        .and(path("/primary"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/primary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(subjects(16)))
        .expect(1)
        .mount(&server)
        .await;
    // Fallback: fails, and is consulted exactly once (first pass only)
    Mock::given(method("GET"))
        .and(path("/fallback"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let loader = chain_loader(
        vec![
            ProxyEndpoint::wrap(format!("{}/primary?u=", server.uri())),
            ProxyEndpoint::wrap(format!("{}/fallback?u=", server.uri())),
        ],
        1,
    );
    let mut cursor = FeedCursor::new(Category::Tv, "美剧", 16);

    let page = loader.load_more(&mut cursor).await.unwrap().unwrap();
    assert_eq!(page.fetched, 16);
    assert_eq!(cursor.offset, 16);
}

// ============================================================================
// Rotation
// ============================================================================

#[tokio::test]
async fn rotation_reopens_an_exhausted_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param(
            "u",
            upstream_url(Category::Movie, "冷门佳片", 0).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(subjects(4)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param(
            "u",
            upstream_url(Category::Movie, "冷门佳片", 20).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(subjects(16)))
        .expect(1)
        .mount(&server)
        .await;

    let loader = relay_loader(&server, 0);
    let mut cursor = FeedCursor::new(Category::Movie, "冷门佳片", 16);

    let first = loader.load_more(&mut cursor).await.unwrap().unwrap();
    assert!(first.is_last);
    assert!(cursor.exhausted);
    assert!(loader.load_more(&mut cursor).await.unwrap().is_none());

    // A fresh batch steps one page past the old window and clears exhaustion
    cursor.rotate();
    assert_eq!(cursor.offset, 20);
    let fresh = loader.load_more(&mut cursor).await.unwrap().unwrap();
    assert_eq!(fresh.items.len(), 16);
    assert_eq!(cursor.offset, 36);
    assert!(!cursor.exhausted);
}
