use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use lookout_common::config::Config;
use lookout_core::cache::CacheStore;
use lookout_core::coordinator::{AcquisitionCoordinator, AcquisitionKind, Command};
use lookout_core::fetcher::{HttpTransport, RateLimitedFetcher};
use lookout_core::known_hosts::KnownHostsStore;
use lookout_core::scanner::NetworkScanner;
use lookout_core::weather::{OpenMeteoClient, WeatherService};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::terminal::report::PrintSink;

const FEED_TIMEOUT: Duration = Duration::from_secs(15);
const WEATHER_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn watch(cfg: Config, once: bool, no_scan: bool) -> anyhow::Result<()> {
    let coordinator = build(&cfg, no_scan)?;

    if once {
        let outcomes = join_all(coordinator.trigger_all().into_iter().map(|handle| handle.wait())).await;
        for outcome in outcomes {
            if let Err(e) = outcome {
                warn!("{e}");
            }
        }
    } else {
        info!(
            "Refreshing every {} min, scanning every {} min. Enter refreshes now, f/w/n refresh one panel, ctrl-c quits",
            cfg.settings.refresh_interval_minutes, cfg.network.scan_interval_minutes
        );
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(read_keys(tx));
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("cannot listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        };
        coordinator.run(rx, ctrl_c).await;
        info!("Shutting down");
    }

    coordinator.shutdown(SHUTDOWN_GRACE).await.context("saving known hosts")
}

fn build(cfg: &Config, no_scan: bool) -> anyhow::Result<AcquisitionCoordinator> {
    let cache = match CacheStore::open(&cfg.settings.cache_dir) {
        Ok(cache) => cache,
        Err(e) => {
            warn!("cache disabled: {e}");
            CacheStore::disabled()
        }
    };
    let cache = Arc::new(cache);

    let transport = HttpTransport::new(FEED_TIMEOUT)?;
    let fetcher = RateLimitedFetcher::new(
        Arc::new(transport),
        Arc::clone(&cache),
        cfg.settings.max_concurrent_fetches,
        cfg.cache_ttl(),
    );
    let mut coordinator = AcquisitionCoordinator::new(
        fetcher,
        cfg.enabled_feeds(),
        cfg.refresh_interval(),
        Arc::new(PrintSink),
    );

    if cfg.weather.enabled {
        let client = OpenMeteoClient::new(WEATHER_TIMEOUT)?;
        let service = WeatherService::new(Arc::new(client), Arc::clone(&cache), cfg.cache_ttl());
        coordinator = coordinator.with_weather(service, cfg.weather.clone());
    }

    if cfg.network.enabled && !no_scan && !cfg.network.targets.is_empty() {
        let store = KnownHostsStore::load(&cfg.network.known_hosts_path)
            .with_context(|| format!("loading {}", cfg.network.known_hosts_path.display()))?;
        debug!("{} known hosts", store.len());
        let scanner = NetworkScanner::new(store, cfg.arp_timeout(), cfg.dns_timeout());
        coordinator = coordinator.with_network(scanner, cfg.network.targets.clone(), cfg.scan_interval());
    }

    Ok(coordinator)
}

async fn read_keys(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let command = match line.trim() {
            "" | "r" => Command::RefreshNow,
            "f" => Command::Refresh(AcquisitionKind::Feeds),
            "w" => Command::Refresh(AcquisitionKind::Weather),
            "n" => Command::Refresh(AcquisitionKind::Network),
            other => {
                debug!("ignoring input '{other}'");
                continue;
            }
        };
        if tx.send(command).await.is_err() {
            break;
        }
    }
}
