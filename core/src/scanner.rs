//! Local network discovery.
//!
//! A scan of one target runs as a pipeline: privilege check, ARP sweep on the
//! blocking pool, hostname resolution, vendor lookup, then classification
//! against the known-hosts store. Every adapter sits behind a trait so the
//! pipeline can be driven without raw sockets.
//!
//! Failures never escape as `Err`: they are recorded on the [`TargetScan`]
//! so one broken target does not hide the others.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use lookout_common::config::NetworkTarget;
use lookout_common::error::{ScanError, StoreError};
use lookout_common::models::{HostObservation, HostStatus, ScanResult, TargetScan};
use lookout_common::network::range::{self, Ipv4Range};
use lookout_common::vendors::VendorRepository;
use pnet::ipnetwork::Ipv4Network;
use pnet::util::MacAddr;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::known_hosts::KnownHostsStore;
use crate::vendors::OuiVendorRepo;

mod arp;
pub mod classify;
mod privilege;
mod resolver;

pub use arp::{ArpProbe, PnetArpProbe};
pub use privilege::{PrivilegeCheck, RootPrivilege, StaticPrivilege};
pub use resolver::{HostnameResolver, MDNS_WINDOW, SystemResolver, short_name};

use classify::Identifier;

pub struct NetworkScanner {
    privilege: Arc<dyn PrivilegeCheck>,
    probe: Arc<dyn ArpProbe>,
    resolver: Arc<dyn HostnameResolver>,
    vendors: Arc<dyn VendorRepository>,
    known_hosts: Arc<Mutex<KnownHostsStore>>,
    arp_timeout: Duration,
    dns_timeout: Duration,
}

impl NetworkScanner {
    /// Scanner with the production adapters: effective-uid check, pnet ARP
    /// sweep, system resolver and the bundled OUI database.
    pub fn new(known_hosts: KnownHostsStore, arp_timeout: Duration, dns_timeout: Duration) -> Self {
        Self {
            privilege: Arc::new(RootPrivilege),
            probe: Arc::new(PnetArpProbe),
            resolver: Arc::new(SystemResolver::new()),
            vendors: Arc::new(OuiVendorRepo),
            known_hosts: Arc::new(Mutex::new(known_hosts)),
            arp_timeout,
            dns_timeout,
        }
    }

    pub fn with_privilege(mut self, privilege: impl PrivilegeCheck + 'static) -> Self {
        self.privilege = Arc::new(privilege);
        self
    }

    pub fn with_probe(mut self, probe: impl ArpProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    pub fn with_resolver(mut self, resolver: impl HostnameResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_vendors(mut self, vendors: impl VendorRepository + 'static) -> Self {
        self.vendors = Arc::new(vendors);
        self
    }

    pub fn known_hosts(&self) -> Arc<Mutex<KnownHostsStore>> {
        Arc::clone(&self.known_hosts)
    }

    /// Scans every target concurrently. Reports come back in target order.
    pub async fn scan_all(&self, targets: &[NetworkTarget]) -> Vec<TargetScan> {
        join_all(targets.iter().map(|target| self.scan(target))).await
    }

    pub async fn scan(&self, target: &NetworkTarget) -> TargetScan {
        let started = Instant::now();
        let mut report = TargetScan::new(&target.name, &target.cidr_range);
        let expected = classify::parse_expected(&target.expected_hosts);

        let network = match range::parse_cidr(&target.cidr_range) {
            Ok(network) => network,
            Err(e) => {
                warn!("target {}: {e}", target.name);
                report.error = Some(e);
                report.duration = started.elapsed();
                return report;
            }
        };

        let hosts_in_range = range::host_range(network);
        if !self.privilege.has_raw_socket_privilege() {
            info!("target {}: no raw-socket privilege, reporting hosts as unknown", target.name);
            let store = self.known_hosts.lock().await;
            report.hosts = classify::unknown_report(&expected, &store, hosts_in_range);
            report.error = Some(ScanError::Unprivileged);
            report.duration = started.elapsed();
            return report;
        }

        match self.sweep(network).await {
            Ok(responders) => {
                debug!("target {}: {} responder(s)", target.name, responders.len());
                let mut hosts = self.identify(responders).await;
                report.error = self
                    .classify_and_persist(&mut hosts, &expected, hosts_in_range)
                    .await
                    .err();
                report.hosts = hosts;
            }
            Err(e) => {
                warn!("target {}: {e}", target.name);
                report.error = Some(e);
            }
        }

        report.scanned_at = Utc::now();
        report.duration = started.elapsed();
        report
    }

    /// Writes the known-hosts store if a scan left it dirty.
    pub async fn flush(&self) -> Result<bool, StoreError> {
        self.known_hosts.lock().await.flush()
    }

    async fn sweep(&self, network: Ipv4Network) -> Result<Vec<(Ipv4Addr, MacAddr)>, ScanError> {
        let probe = Arc::clone(&self.probe);
        let timeout = self.arp_timeout;
        let found = tokio::task::spawn_blocking(move || probe.probe(network, timeout))
            .await
            .map_err(|e| ScanError::Io(e.to_string()))?
            .map_err(|e| ScanError::Io(format!("{e:#}")))?;

        let hosts = range::host_range(network);
        Ok(found.into_iter().filter(|(ip, _)| hosts.contains(*ip)).collect())
    }

    /// Hostnames and vendors for every responder. An mDNS name wins over the
    /// reverse DNS answer.
    async fn identify(&self, responders: Vec<(Ipv4Addr, MacAddr)>) -> Vec<ScanResult> {
        let ips: Vec<IpAddr> = responders.iter().map(|(ip, _)| IpAddr::V4(*ip)).collect();

        let lookups = ips.iter().map(|ip| async move {
            let name = tokio::time::timeout(self.dns_timeout, self.resolver.resolve(*ip))
                .await
                .ok()
                .flatten();
            (*ip, name)
        });
        let mut names: HashMap<IpAddr, String> = join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(ip, name)| name.map(|name| (ip, name)))
            .collect();
        names.extend(self.resolver.discover_mdns(&ips).await);

        let vendors = Arc::clone(&self.vendors);
        let macs: Vec<MacAddr> = responders.iter().map(|(_, mac)| *mac).collect();
        let vendor_names = tokio::task::spawn_blocking(move || {
            macs.into_iter().map(|mac| vendors.get_vendor(mac)).collect::<Vec<_>>()
        })
        .await
        .unwrap_or_else(|e| {
            debug!("vendor lookup failed: {e}");
            vec![None; responders.len()]
        });

        responders
            .into_iter()
            .zip(vendor_names)
            .map(|((ip, mac), vendor)| {
                let ip = IpAddr::V4(ip);
                let mut host = ScanResult::up(ip, mac);
                host.hostname = names.get(&ip).cloned();
                host.vendor = vendor;
                host
            })
            .collect()
    }

    async fn classify_and_persist(
        &self,
        hosts: &mut Vec<ScanResult>,
        expected: &[Identifier],
        hosts_in_range: Ipv4Range,
    ) -> Result<(), ScanError> {
        let mut store = self.known_hosts.lock().await;
        classify::classify(hosts, expected, &store, hosts_in_range);

        let now = Utc::now();
        for host in hosts.iter() {
            if let (Some(mac), Some(ip)) = (host.mac, host.ip)
                && host.status == HostStatus::Up
            {
                let observation = HostObservation {
                    mac,
                    ip,
                    hostname: host.hostname.clone(),
                    vendor: host.vendor.clone(),
                };
                if store.upsert(&observation, now) {
                    info!("new host {} ({mac})", host.display_name());
                }
            }
        }

        store.flush().map(|_| ()).map_err(|e| {
            warn!("saving known hosts to {}: {e}", store.path().display());
            ScanError::Storage(e.to_string())
        })
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProbe {
        replies: Vec<(Ipv4Addr, MacAddr)>,
        calls: Arc<AtomicUsize>,
    }

    impl ArpProbe for FixedProbe {
        fn probe(&self, _network: Ipv4Network, _timeout: Duration) -> anyhow::Result<Vec<(Ipv4Addr, MacAddr)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.replies.clone())
        }
    }

    struct FailingProbe;

    impl ArpProbe for FailingProbe {
        fn probe(&self, _network: Ipv4Network, _timeout: Duration) -> anyhow::Result<Vec<(Ipv4Addr, MacAddr)>> {
            anyhow::bail!("no interface on network")
        }
    }

    struct Names {
        dns: HashMap<IpAddr, String>,
        mdns: HashMap<IpAddr, String>,
    }

    #[async_trait]
    impl HostnameResolver for Names {
        async fn resolve(&self, ip: IpAddr) -> Option<String> {
            self.dns.get(&ip).cloned()
        }

        async fn discover_mdns(&self, _ips: &[IpAddr]) -> HashMap<IpAddr, String> {
            self.mdns.clone()
        }
    }

    struct SlowResolver;

    #[async_trait]
    impl HostnameResolver for SlowResolver {
        async fn resolve(&self, _ip: IpAddr) -> Option<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Some("too-late".into())
        }
    }

    struct NoVendors;

    impl VendorRepository for NoVendors {
        fn get_vendor(&self, _mac: MacAddr) -> Option<String> {
            None
        }
    }

    fn responder() -> (Ipv4Addr, MacAddr) {
        (Ipv4Addr::new(192, 168, 1, 10), MacAddr::new(0xaa, 0xbb, 0xcc, 0, 0, 1))
    }

    fn target(expected: &[&str]) -> NetworkTarget {
        NetworkTarget {
            name: "home".into(),
            cidr_range: "192.168.1.0/24".into(),
            expected_hosts: expected.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn scanner(dir: &tempfile::TempDir, replies: Vec<(Ipv4Addr, MacAddr)>) -> (NetworkScanner, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = KnownHostsStore::empty(dir.path().join("known_hosts.json"));
        let scanner = NetworkScanner::new(store, Duration::from_millis(10), Duration::from_millis(50))
            .with_privilege(StaticPrivilege(true))
            .with_probe(FixedProbe {
                replies,
                calls: Arc::clone(&calls),
            })
            .with_resolver(Names {
                dns: HashMap::new(),
                mdns: HashMap::new(),
            })
            .with_vendors(NoVendors);
        (scanner, calls)
    }

    #[tokio::test]
    async fn responder_is_new_only_on_first_scan() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, _) = scanner(&dir, vec![responder()]);

        let first = scanner.scan(&target(&[])).await;
        assert_eq!(first.error, None);
        assert_eq!(first.hosts.len(), 1);
        assert_eq!(first.hosts[0].status, HostStatus::Up);
        assert!(first.hosts[0].is_new);

        let second = scanner.scan(&target(&[])).await;
        assert!(!second.hosts[0].is_new);

        let reloaded = KnownHostsStore::load(dir.path().join("known_hosts.json")).unwrap();
        assert!(reloaded.is_known(responder().1));
    }

    #[tokio::test]
    async fn unprivileged_scan_skips_the_probe() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, calls) = scanner(&dir, vec![responder()]);
        let scanner = scanner.with_privilege(StaticPrivilege(false));

        let report = scanner.scan(&target(&["router", "192.168.1.1"])).await;

        assert_eq!(report.error, Some(ScanError::Unprivileged));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.hosts.len(), 2);
        assert!(report.hosts.iter().all(|h| h.status == HostStatus::Unknown));
    }

    #[tokio::test]
    async fn unprivileged_scan_still_lists_known_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, calls) = scanner(&dir, vec![responder()]);
        scanner.scan(&target(&[])).await;
        let scanner = scanner.with_privilege(StaticPrivilege(false));

        let report = scanner.scan(&target(&[])).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.hosts.len(), 1);
        assert_eq!(report.hosts[0].status, HostStatus::Unknown);
        assert_eq!(report.hosts[0].mac, Some(responder().1));
    }

    #[tokio::test]
    async fn known_host_that_goes_quiet_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, _) = scanner(&dir, vec![responder()]);
        scanner.scan(&target(&[])).await;
        let scanner = scanner.with_probe(FixedProbe {
            replies: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        });

        let report = scanner.scan(&target(&[])).await;

        assert_eq!(report.error, None);
        assert_eq!(report.hosts.len(), 1);
        assert_eq!(report.hosts[0].status, HostStatus::Unknown);
        assert_eq!(report.hosts[0].ip, Some(IpAddr::V4(responder().0)));
        assert_eq!(report.hosts_up(), 0);
    }

    #[tokio::test]
    async fn invalid_range_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, calls) = scanner(&dir, vec![]);
        let mut bad = target(&[]);
        bad.cidr_range = "192.168.1.0/33".into();

        let report = scanner.scan(&bad).await;
        assert!(matches!(report.error, Some(ScanError::Config(_))));
        assert!(report.hosts.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn probe_failure_is_reported_per_target() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, _) = scanner(&dir, vec![]);
        let scanner = scanner.with_probe(FailingProbe);

        let report = scanner.scan(&target(&[])).await;
        assert!(matches!(report.error, Some(ScanError::Io(ref msg)) if msg.contains("no interface")));
    }

    #[tokio::test]
    async fn replies_outside_the_target_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let stray = (Ipv4Addr::new(10, 0, 0, 5), MacAddr::new(0xaa, 0xbb, 0xcc, 0, 0, 9));
        let (scanner, _) = scanner(&dir, vec![responder(), stray]);

        let report = scanner.scan(&target(&[])).await;
        assert_eq!(report.hosts.len(), 1);
    }

    #[tokio::test]
    async fn mdns_name_wins_over_reverse_dns() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, _) = scanner(&dir, vec![responder()]);
        let ip = IpAddr::V4(responder().0);
        let scanner = scanner.with_resolver(Names {
            dns: HashMap::from([(ip, "dhcp-10".to_string())]),
            mdns: HashMap::from([(ip, "printer".to_string())]),
        });

        let report = scanner.scan(&target(&["printer"])).await;
        assert_eq!(report.hosts.len(), 1);
        assert_eq!(report.hosts[0].hostname.as_deref(), Some("printer"));
        assert!(report.hosts[0].is_expected);
    }

    #[tokio::test]
    async fn slow_reverse_lookup_is_cut_off() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, _) = scanner(&dir, vec![responder()]);
        let scanner = scanner.with_resolver(SlowResolver);

        let report = scanner.scan(&target(&[])).await;
        assert_eq!(report.hosts[0].hostname, None);
    }

    #[tokio::test]
    async fn silent_expected_host_is_down() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, _) = scanner(&dir, vec![responder()]);

        let report = scanner.scan(&target(&["192.168.1.1"])).await;
        assert_eq!(report.hosts_up(), 1);
        assert_eq!(report.hosts_down(), 1);
        let down = report.hosts.iter().find(|h| h.status == HostStatus::Down).unwrap();
        assert!(down.is_expected);
        assert_eq!(down.ip, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
    }

    #[tokio::test]
    async fn targets_are_scanned_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (scanner, calls) = scanner(&dir, vec![responder()]);
        let mut other = target(&[]);
        other.name = "lab".into();
        other.cidr_range = "10.0.0.0/30".into();

        let reports = scanner.scan_all(&[target(&[]), other]).await;
        assert_eq!(reports[0].target_name, "home");
        assert_eq!(reports[1].target_name, "lab");
        assert!(reports[1].hosts.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
