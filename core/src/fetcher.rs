//! # Rate-Limited Feed Fetcher
//!
//! Fetches every configured feed concurrently, but never lets more than
//! `max_concurrent` requests be outstanding at once. Each source is served
//! cache-first:
//!
//! 1. A fresh cache entry is returned without touching the network.
//! 2. A stale entry is handed to the preview hook, then the network is tried.
//! 3. A successful fetch is parsed and written back to the cache.
//! 4. A failed fetch or parse falls back to the stale entry, or fails.
//!
//! The cache is only written after a complete body was parsed, so an
//! abandoned or malformed response never replaces good data.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use lookout_common::config::{DEFAULT_MAX_CONCURRENT_FETCHES, FeedSource};
use lookout_common::error::{CacheError, FetchError};
use lookout_common::models::FeedItem;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::cache::{Acquired, CacheStore, CachedValue, stale_fallback};
use crate::retry::RetryPolicy;

pub mod json_path;
pub mod parse;
pub mod transport;

pub use transport::{FeedTransport, HttpTransport};

pub type FeedOutcome = Acquired<Vec<FeedItem>>;
pub type FeedResult = (FeedSource, Result<FeedOutcome, FetchError>);

pub struct RateLimitedFetcher {
    transport: Arc<dyn FeedTransport>,
    cache: Arc<CacheStore>,
    permits: Semaphore,
    max_concurrent: usize,
    ttl: Duration,
    retry: RetryPolicy,
}

impl RateLimitedFetcher {
    pub fn new(transport: Arc<dyn FeedTransport>, cache: Arc<CacheStore>, max_concurrent: usize, ttl: Duration) -> Self {
        let max_concurrent = if max_concurrent == 0 {
            DEFAULT_MAX_CONCURRENT_FETCHES
        } else {
            max_concurrent
        };
        Self {
            transport,
            cache,
            permits: Semaphore::new(max_concurrent),
            max_concurrent,
            ttl,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// One result per source, in submission order. Sources complete in any order.
    pub async fn fetch_all(&self, sources: &[FeedSource]) -> Vec<FeedResult> {
        self.fetch_all_with_preview(sources, &ignore_preview).await
    }

    /// Like [`fetch_all`](Self::fetch_all); `preview` sees stale cache
    /// entries before their network attempt finishes.
    pub async fn fetch_all_with_preview(
        &self,
        sources: &[FeedSource],
        preview: &(dyn Fn(&FeedSource, &FeedOutcome) + Send + Sync),
    ) -> Vec<FeedResult> {
        info!("Fetching {} feeds ({} at a time)", sources.len(), self.max_concurrent);
        let fetches = sources.iter().map(|source| async move {
            let result = self.fetch_one(source, preview).await;
            (source.clone(), result)
        });
        join_all(fetches).await
    }

    pub async fn fetch_one(
        &self,
        source: &FeedSource,
        preview: &(dyn Fn(&FeedSource, &FeedOutcome) + Send + Sync),
    ) -> Result<FeedOutcome, FetchError> {
        let key = source.cache_key();
        let cached = self.read_cache(&key);

        if let Some(entry) = &cached {
            let outcome = Acquired::from_cached(entry);
            if entry.is_fresh {
                debug!("{}: served from cache", source.name);
                return Ok(outcome);
            }
            preview(source, &outcome);
        }

        let body = match self.download(&source.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("{}: fetch failed: {e}", source.name);
                return stale_fallback(cached, e);
            }
        };

        let items = match parse::parse_feed(source, &body) {
            Ok(items) => items,
            Err(e) => {
                warn!("{}: {e}", source.name);
                return stale_fallback(cached, e);
            }
        };

        if let Err(e) = self.cache.put_as(&key, &items, self.ttl) {
            warn!("{}: could not write cache: {e}", source.name);
        }
        debug!("{}: {} items", source.name, items.len());
        Ok(Acquired::fresh(items))
    }

    async fn download(&self, url: &str) -> Result<String, FetchError> {
        let permits = &self.permits;
        let transport = &self.transport;
        self.retry
            .run(url, move || async move {
                // The permit covers a single attempt; backoff sleeps do not hold one.
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|_| FetchError::ConnectionError("fetcher is shut down".into()))?;
                transport.get(url).await
            })
            .await
    }

    fn read_cache(&self, key: &str) -> Option<CachedValue<Vec<FeedItem>>> {
        match self.cache.get_as(key) {
            Ok(entry) => Some(entry),
            Err(CacheError::NotFound(_)) => None,
            Err(e) => {
                warn!("ignoring cache entry {key}: {e}");
                None
            }
        }
    }
}

fn ignore_preview(_: &FeedSource, _: &FeedOutcome) {}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
