use std::sync::Arc;
use std::time::Duration;

use lookout_common::config::{FeedKind, FeedSource};
use lookout_common::error::FetchError;
use lookout_core::cache::{CacheStore, Freshness};
use lookout_core::fetcher::{HttpTransport, RateLimitedFetcher};
use lookout_core::retry::RetryPolicy;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Example</title>
  <item><title>First</title><link>https://example.com/1</link><pubDate>Tue, 10 Jun 2025 04:00:00 GMT</pubDate></item>
  <item><title>Second</title><link>https://example.com/2</link></item>
</channel></rss>"#;

const JSON: &str = r#"{"stories": [
  {"title": "Alpha", "url": "https://example.com/a", "created_utc": 1700000000},
  {"title": "Beta", "url": "https://example.com/b"}
]}"#;

fn source(server: &MockServer, name: &str, route: &str, kind: FeedKind, json_path: Option<&str>) -> FeedSource {
    FeedSource {
        name: name.into(),
        url: format!("{}{route}", server.uri()),
        kind,
        enabled: true,
        json_path: json_path.map(str::to_string),
    }
}

fn fetcher(cache: Arc<CacheStore>, ttl: Duration) -> RateLimitedFetcher {
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    RateLimitedFetcher::new(Arc::new(transport), cache, 3, ttl).with_retry(RetryPolicy::none())
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn mixed_sources_report_individually() {
    let server = MockServer::start().await;
    serve(&server, "/rss", 200, RSS).await;
    serve(&server, "/json", 200, JSON).await;
    serve(&server, "/gone", 404, "").await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(CacheStore::open(dir.path()).unwrap());
    let sources = vec![
        source(&server, "rss", "/rss", FeedKind::Rss, None),
        source(&server, "json", "/json", FeedKind::Json, Some("$.stories")),
        source(&server, "gone", "/gone", FeedKind::Rss, None),
    ];

    let results = fetcher(cache, Duration::from_secs(300)).fetch_all(&sources).await;

    assert_eq!(results.len(), 3);
    let (rss_source, rss) = &results[0];
    assert_eq!(rss_source.name, "rss");
    let rss = rss.as_ref().unwrap();
    assert_eq!(rss.freshness, Freshness::Fresh);
    assert_eq!(rss.value.len(), 2);
    assert!(rss.value[0].published_at.is_some());

    let json = results[1].1.as_ref().unwrap();
    assert_eq!(json.value[0].title, "Alpha");
    assert_eq!(json.value[0].source_name, "json");

    assert_eq!(results[2].1, Err(FetchError::HttpError(404)));
}

#[tokio::test]
async fn second_fetch_inside_ttl_stays_off_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(CacheStore::open(dir.path()).unwrap());
    let fetcher = fetcher(cache, Duration::from_secs(300));
    let sources = vec![source(&server, "rss", "/rss", FeedKind::Rss, None)];

    fetcher.fetch_all(&sources).await;
    let again = fetcher.fetch_all(&sources).await;

    let outcome = again[0].1.as_ref().unwrap();
    assert!(matches!(outcome.freshness, Freshness::Cached { .. }));
    assert_eq!(outcome.value.len(), 2);
}

#[tokio::test]
async fn outage_falls_back_to_stale_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, "/rss", 503, "").await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(CacheStore::open(dir.path()).unwrap());
    let fetcher = fetcher(cache, Duration::ZERO);
    let sources = vec![source(&server, "rss", "/rss", FeedKind::Rss, None)];

    let first = fetcher.fetch_all(&sources).await;
    assert_eq!(first[0].1.as_ref().unwrap().freshness, Freshness::Fresh);

    let second = fetcher.fetch_all(&sources).await;
    let outcome = second[0].1.as_ref().unwrap();
    assert!(outcome.is_stale());
    assert_eq!(outcome.error, Some(FetchError::HttpError(503)));
    assert_eq!(outcome.value.len(), 2);
}

#[tokio::test]
async fn missing_json_path_leaves_cache_empty() {
    let server = MockServer::start().await;
    serve(&server, "/json", 200, JSON).await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(CacheStore::open(dir.path()).unwrap());
    let feed = source(&server, "json", "/json", FeedKind::Json, Some("$.data.children"));

    let results = fetcher(Arc::clone(&cache), Duration::from_secs(300))
        .fetch_all(std::slice::from_ref(&feed))
        .await;

    assert!(matches!(results[0].1, Err(FetchError::ParseError(_))));
    assert!(cache.get(&feed.cache_key()).is_err());
}

#[tokio::test]
async fn urls_differing_only_in_punctuation_keep_separate_entries() {
    let server = MockServer::start().await;
    for route in ["/news", "/news/cat=1"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(CacheStore::open(dir.path()).unwrap());
    let fetcher = fetcher(cache, Duration::from_secs(300));
    let sources = vec![
        source(&server, "query", "/news?cat=1", FeedKind::Rss, None),
        source(&server, "path", "/news/cat=1", FeedKind::Rss, None),
    ];

    fetcher.fetch_all(&sources).await;
    let again = fetcher.fetch_all(&sources).await;

    for (source, result) in &again {
        let outcome = result.as_ref().unwrap();
        assert!(matches!(outcome.freshness, Freshness::Cached { .. }), "{} refetched", source.name);
    }
}
