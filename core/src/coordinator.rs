//! # Acquisition Coordinator
//!
//! Runs the three acquisition kinds (feeds, weather, network) side by side.
//! Each kind has at most one cycle in flight: a trigger for a kind that is
//! already running hands back a handle on the running cycle instead of
//! starting another. Outcomes are published to the [`AcquisitionSink`] the
//! moment they complete, independently of the other kinds.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use lookout_common::config::{FeedSource, NetworkTarget, WeatherConfig};
use lookout_common::error::{CycleError, FetchError, StoreError};
use lookout_common::models::TargetScan;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::fetcher::{FeedOutcome, FeedResult, RateLimitedFetcher};
use crate::scanner::NetworkScanner;
use crate::weather::{WeatherOutcome, WeatherService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionKind {
    Feeds,
    Weather,
    Network,
}

impl AcquisitionKind {
    pub const ALL: [AcquisitionKind; 3] = [Self::Feeds, Self::Weather, Self::Network];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feeds => "feeds",
            Self::Weather => "weather",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cycle that died before producing an outcome (panic or abort).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleFailure {
    pub kind: AcquisitionKind,
    pub reason: String,
}

#[derive(Debug)]
pub enum AcquisitionOutcome {
    Feeds(Vec<FeedResult>),
    Weather(Result<WeatherOutcome, FetchError>),
    Network(Vec<TargetScan>),
    Failed(CycleFailure),
}

impl AcquisitionOutcome {
    pub fn kind(&self) -> AcquisitionKind {
        match self {
            Self::Feeds(_) => AcquisitionKind::Feeds,
            Self::Weather(_) => AcquisitionKind::Weather,
            Self::Network(_) => AcquisitionKind::Network,
            Self::Failed(failure) => failure.kind,
        }
    }
}

/// What the presentation layer receives.
#[derive(Debug, Clone)]
pub enum AcquisitionUpdate {
    /// A stale cache entry, shown while its source is being refetched.
    FeedPreview { source: FeedSource, outcome: FeedOutcome },
    /// Same for the weather location.
    WeatherPreview(WeatherOutcome),
    Completed(Arc<AcquisitionOutcome>),
}

pub trait AcquisitionSink: Send + Sync {
    fn publish(&self, update: AcquisitionUpdate);
}

/// Forwards updates into an unbounded channel. Updates sent after the
/// receiver is gone are dropped.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AcquisitionUpdate>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<AcquisitionUpdate>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AcquisitionUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl AcquisitionSink for ChannelSink {
    fn publish(&self, update: AcquisitionUpdate) {
        if self.tx.send(update).is_err() {
            debug!("update dropped, receiver closed");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Trigger every kind and restart both timers.
    RefreshNow,
    Refresh(AcquisitionKind),
}

type Slot = Option<Result<Arc<AcquisitionOutcome>, CycleError>>;

/// Observes one cycle. Several handles may observe the same cycle.
#[derive(Clone)]
pub struct CycleHandle {
    kind: AcquisitionKind,
    rx: watch::Receiver<Slot>,
}

impl CycleHandle {
    fn refused(kind: AcquisitionKind, reason: CycleError) -> Self {
        let (_, rx) = watch::channel(Some(Err(reason)));
        Self { kind, rx }
    }

    pub fn kind(&self) -> AcquisitionKind {
        self.kind
    }

    pub async fn wait(mut self) -> Result<Arc<AcquisitionOutcome>, CycleError> {
        let slot = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CycleError::Abandoned)?;
        match &*slot {
            Some(result) => result.clone(),
            None => Err(CycleError::Abandoned),
        }
    }
}

struct InFlight {
    rx: watch::Receiver<Slot>,
    supervisor: JoinHandle<()>,
    work: AbortHandle,
}

impl InFlight {
    fn is_running(&self) -> bool {
        self.rx.borrow().is_none() && !self.supervisor.is_finished()
    }
}

struct WeatherJob {
    service: WeatherService,
    location: WeatherConfig,
}

struct NetworkJob {
    scanner: NetworkScanner,
    targets: Vec<NetworkTarget>,
    scan_interval: Duration,
}

pub struct AcquisitionCoordinator {
    fetcher: Arc<RateLimitedFetcher>,
    feeds: Arc<[FeedSource]>,
    weather: Option<Arc<WeatherJob>>,
    network: Option<Arc<NetworkJob>>,
    sink: Arc<dyn AcquisitionSink>,
    refresh_interval: Duration,
    registry: Mutex<HashMap<AcquisitionKind, InFlight>>,
    accepting: AtomicBool,
}

impl AcquisitionCoordinator {
    /// Disabled feed sources are dropped here and never fetched.
    pub fn new(
        fetcher: RateLimitedFetcher,
        feeds: Vec<FeedSource>,
        refresh_interval: Duration,
        sink: Arc<dyn AcquisitionSink>,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            feeds: feeds.into_iter().filter(|feed| feed.enabled).collect(),
            weather: None,
            network: None,
            sink,
            refresh_interval,
            registry: Mutex::new(HashMap::new()),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn with_weather(mut self, service: WeatherService, location: WeatherConfig) -> Self {
        self.weather = Some(Arc::new(WeatherJob { service, location }));
        self
    }

    /// Network scans run on their own `scan_interval` instead of the refresh
    /// interval shared by feeds and weather.
    pub fn with_network(mut self, scanner: NetworkScanner, targets: Vec<NetworkTarget>, scan_interval: Duration) -> Self {
        self.network = Some(Arc::new(NetworkJob {
            scanner,
            targets,
            scan_interval,
        }));
        self
    }

    pub fn is_configured(&self, kind: AcquisitionKind) -> bool {
        match kind {
            AcquisitionKind::Feeds => !self.feeds.is_empty(),
            AcquisitionKind::Weather => self.weather.is_some(),
            AcquisitionKind::Network => self.network.is_some(),
        }
    }

    /// Starts a cycle for `kind`, or joins the one already running.
    pub fn trigger(&self, kind: AcquisitionKind) -> CycleHandle {
        // `accepting` only flips while the registry is held.
        let mut registry = self.registry();
        if !self.accepting.load(Ordering::SeqCst) {
            return CycleHandle::refused(kind, CycleError::ShuttingDown);
        }
        if !self.is_configured(kind) {
            return CycleHandle::refused(kind, CycleError::NotConfigured(kind.as_str()));
        }

        if let Some(running) = registry.get(&kind)
            && running.is_running()
        {
            debug!("{kind} cycle already running, joining it");
            return CycleHandle {
                kind,
                rx: running.rx.clone(),
            };
        }

        let (tx, rx) = watch::channel(None);
        let work = tokio::spawn(self.cycle(kind));
        let abort = work.abort_handle();
        let sink = Arc::clone(&self.sink);

        let supervisor = tokio::spawn(async move {
            let outcome = match work.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{kind} cycle failed: {e}");
                    AcquisitionOutcome::Failed(CycleFailure {
                        kind,
                        reason: e.to_string(),
                    })
                }
            };
            let outcome = Arc::new(outcome);
            sink.publish(AcquisitionUpdate::Completed(Arc::clone(&outcome)));
            tx.send_replace(Some(Ok(outcome)));
        });

        debug!("{kind} cycle started");
        registry.insert(
            kind,
            InFlight {
                rx: rx.clone(),
                supervisor,
                work: abort,
            },
        );
        CycleHandle { kind, rx }
    }

    /// Triggers every configured kind.
    pub fn trigger_all(&self) -> Vec<CycleHandle> {
        self.trigger_each(&AcquisitionKind::ALL)
    }

    fn trigger_each(&self, kinds: &[AcquisitionKind]) -> Vec<CycleHandle> {
        kinds
            .iter()
            .filter(|kind| self.is_configured(**kind))
            .map(|kind| self.trigger(*kind))
            .collect()
    }

    /// Auto-refresh loop, until `shutdown` resolves. Feeds and weather are
    /// triggered on the first tick and then every refresh interval; network
    /// scans follow their own scan interval.
    pub async fn run(&self, mut commands: mpsc::Receiver<Command>, shutdown: impl Future<Output = ()>) {
        let scan_interval = self.network.as_ref().map(|job| job.scan_interval);
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut scan_ticker = tokio::time::interval(scan_interval.unwrap_or(self.refresh_interval));
        scan_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.trigger_each(&[AcquisitionKind::Feeds, AcquisitionKind::Weather]);
                }
                _ = scan_ticker.tick(), if scan_interval.is_some() => {
                    self.trigger(AcquisitionKind::Network);
                }
                command = commands.recv(), if commands_open => match command {
                    Some(Command::RefreshNow) => {
                        info!("Manual refresh");
                        self.trigger_all();
                        ticker.reset();
                        scan_ticker.reset();
                    }
                    Some(Command::Refresh(kind)) => {
                        self.trigger(kind);
                    }
                    None => commands_open = false,
                },
            }
        }
    }

    /// Refuses new triggers, gives running cycles `grace` to finish, aborts
    /// the rest and writes the known-hosts store.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), StoreError> {
        let running: Vec<InFlight> = {
            let mut registry = self.registry();
            self.accepting.store(false, Ordering::SeqCst);
            registry.drain().map(|(_, cycle)| cycle).collect()
        };

        let aborts: Vec<(AbortHandle, AbortHandle)> = running
            .iter()
            .map(|cycle| (cycle.work.clone(), cycle.supervisor.abort_handle()))
            .collect();
        let supervisors = running.into_iter().map(|cycle| cycle.supervisor);

        if tokio::time::timeout(grace, join_all(supervisors)).await.is_err() {
            warn!("grace period over, aborting {} cycle(s)", aborts.len());
            for (work, supervisor) in aborts {
                work.abort();
                supervisor.abort();
            }
        }

        match &self.network {
            Some(job) => {
                if job.scanner.flush().await? {
                    info!("Known hosts saved");
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn cycle(&self, kind: AcquisitionKind) -> impl Future<Output = AcquisitionOutcome> + Send + use<> {
        let fetcher = Arc::clone(&self.fetcher);
        let feeds = Arc::clone(&self.feeds);
        let weather = self.weather.clone();
        let network = self.network.clone();
        let sink = Arc::clone(&self.sink);

        async move {
            match kind {
                AcquisitionKind::Feeds => {
                    let preview = move |source: &FeedSource, outcome: &FeedOutcome| {
                        sink.publish(AcquisitionUpdate::FeedPreview {
                            source: source.clone(),
                            outcome: outcome.clone(),
                        });
                    };
                    AcquisitionOutcome::Feeds(fetcher.fetch_all_with_preview(&feeds, &preview).await)
                }
                AcquisitionKind::Weather => match weather {
                    Some(job) => {
                        let preview = move |outcome: &WeatherOutcome| {
                            sink.publish(AcquisitionUpdate::WeatherPreview(outcome.clone()));
                        };
                        AcquisitionOutcome::Weather(job.service.fetch_with_preview(&job.location, &preview).await)
                    }
                    None => unconfigured(kind),
                },
                AcquisitionKind::Network => match network {
                    Some(job) => AcquisitionOutcome::Network(job.scanner.scan_all(&job.targets).await),
                    None => unconfigured(kind),
                },
            }
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<AcquisitionKind, InFlight>> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unconfigured(kind: AcquisitionKind) -> AcquisitionOutcome {
    AcquisitionOutcome::Failed(CycleFailure {
        kind,
        reason: CycleError::NotConfigured(kind.as_str()).to_string(),
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
