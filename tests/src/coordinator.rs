use std::sync::Arc;
use std::time::Duration;

use lookout_common::config::{FeedKind, FeedSource};
use lookout_core::cache::CacheStore;
use lookout_core::coordinator::{AcquisitionCoordinator, AcquisitionKind, AcquisitionOutcome, AcquisitionUpdate, ChannelSink};
use lookout_core::fetcher::{HttpTransport, RateLimitedFetcher};
use lookout_core::retry::RetryPolicy;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS: &str = r#"<rss version="2.0"><channel>
  <item><title>Only</title><link>https://example.com/only</link></item>
</channel></rss>"#;

#[tokio::test]
async fn overlapping_refreshes_hit_the_server_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(RSS)
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let feed = FeedSource {
        name: "slow".into(),
        url: format!("{}/rss", server.uri()),
        kind: FeedKind::Rss,
        enabled: true,
        json_path: None,
    };
    let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
    let fetcher = RateLimitedFetcher::new(
        Arc::new(transport),
        Arc::new(CacheStore::disabled()),
        3,
        Duration::from_secs(60),
    )
    .with_retry(RetryPolicy::none());
    let (sink, mut updates) = ChannelSink::channel();
    let coordinator = AcquisitionCoordinator::new(fetcher, vec![feed], Duration::from_secs(3600), Arc::new(sink));

    let handles: Vec<_> = (0..3).map(|_| coordinator.trigger(AcquisitionKind::Feeds)).collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.wait().await.unwrap());
    }

    assert!(outcomes.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    let AcquisitionOutcome::Feeds(results) = &*outcomes[0] else {
        panic!("expected feed results");
    };
    assert_eq!(results[0].1.as_ref().unwrap().value[0].title, "Only");

    assert!(matches!(updates.recv().await, Some(AcquisitionUpdate::Completed(_))));
    assert!(updates.try_recv().is_err());

    coordinator.shutdown(Duration::from_secs(1)).await.unwrap();
}
