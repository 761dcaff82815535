use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lookout_common::config::NetworkTarget;
use lookout_common::error::ScanError;
use lookout_common::models::HostStatus;
use lookout_common::vendors::VendorRepository;
use lookout_core::known_hosts::KnownHostsStore;
use lookout_core::scanner::{ArpProbe, HostnameResolver, NetworkScanner, StaticPrivilege};
use pnet::ipnetwork::Ipv4Network;
use pnet::util::MacAddr;

struct FakeProbe {
    replies: Vec<(Ipv4Addr, MacAddr)>,
    calls: Arc<AtomicUsize>,
}

impl ArpProbe for FakeProbe {
    fn probe(&self, _network: Ipv4Network, _timeout: Duration) -> anyhow::Result<Vec<(Ipv4Addr, MacAddr)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.replies.clone())
    }
}

struct NoNames;

#[async_trait]
impl HostnameResolver for NoNames {
    async fn resolve(&self, _ip: IpAddr) -> Option<String> {
        None
    }

    async fn discover_mdns(&self, _ips: &[IpAddr]) -> HashMap<IpAddr, String> {
        HashMap::new()
    }
}

struct StaticVendor;

impl VendorRepository for StaticVendor {
    fn get_vendor(&self, _mac: MacAddr) -> Option<String> {
        Some("Acme".into())
    }
}

fn home() -> NetworkTarget {
    NetworkTarget {
        name: "home".into(),
        cidr_range: "192.168.1.0/24".into(),
        expected_hosts: Vec::new(),
    }
}

fn responder() -> (Ipv4Addr, MacAddr) {
    (Ipv4Addr::new(192, 168, 1, 10), MacAddr::new(0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01))
}

fn scanner(store: KnownHostsStore, privileged: bool, calls: &Arc<AtomicUsize>) -> NetworkScanner {
    NetworkScanner::new(store, Duration::from_millis(10), Duration::from_millis(100))
        .with_privilege(StaticPrivilege(privileged))
        .with_probe(FakeProbe {
            replies: vec![responder()],
            calls: Arc::clone(calls),
        })
        .with_resolver(NoNames)
        .with_vendors(StaticVendor)
}

#[tokio::test]
async fn new_host_is_reported_once_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("known_hosts.json");
    let calls = Arc::new(AtomicUsize::new(0));

    let first = scanner(KnownHostsStore::load(&path).unwrap(), true, &calls)
        .scan(&home())
        .await;
    assert_eq!(first.error, None);
    assert_eq!(first.hosts.len(), 1);
    let host = &first.hosts[0];
    assert_eq!(host.status, HostStatus::Up);
    assert_eq!(host.ip, Some(IpAddr::V4(responder().0)));
    assert_eq!(host.vendor.as_deref(), Some("Acme"));
    assert!(host.is_new);

    // a fresh process reading the saved file
    let second = scanner(KnownHostsStore::load(&path).unwrap(), true, &calls)
        .scan(&home())
        .await;
    assert_eq!(second.hosts.len(), 1);
    assert!(!second.hosts[0].is_new);

    let store = KnownHostsStore::load(&path).unwrap();
    let record = store.get(responder().1).unwrap();
    assert_eq!(record.vendor.as_deref(), Some("Acme"));
    assert!(record.first_seen <= record.last_seen);
}

#[tokio::test]
async fn unprivileged_scan_reports_unknown_without_probing() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut target = home();
    target.expected_hosts = vec!["192.168.1.1".into(), "AA:BB:CC:00:00:01".into()];

    let report = scanner(KnownHostsStore::empty(dir.path().join("hosts.json")), false, &calls)
        .scan(&target)
        .await;

    assert_eq!(report.error, Some(ScanError::Unprivileged));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.hosts.len(), 2);
    assert!(report.hosts.iter().all(|h| h.status == HostStatus::Unknown));
    assert!(!dir.path().join("hosts.json").exists());
}

#[tokio::test]
async fn unwritable_store_still_returns_hosts() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let report = scanner(KnownHostsStore::empty(blocker.join("hosts.json")), true, &calls)
        .scan(&home())
        .await;

    assert!(matches!(report.error, Some(ScanError::Storage(_))));
    assert_eq!(report.hosts.len(), 1);
    assert!(report.hosts[0].is_new);
}

#[tokio::test]
async fn previously_seen_host_is_reported_without_privilege() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("known_hosts.json");
    let calls = Arc::new(AtomicUsize::new(0));

    scanner(KnownHostsStore::load(&path).unwrap(), true, &calls)
        .scan(&home())
        .await;

    let report = scanner(KnownHostsStore::load(&path).unwrap(), false, &calls)
        .scan(&home())
        .await;

    assert_eq!(report.error, Some(ScanError::Unprivileged));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.hosts.len(), 1);
    let host = &report.hosts[0];
    assert_eq!(host.status, HostStatus::Unknown);
    assert_eq!(host.mac, Some(responder().1));
    assert_eq!(host.vendor.as_deref(), Some("Acme"));
}

#[tokio::test]
async fn previously_seen_host_that_stops_answering_stays_in_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("known_hosts.json");
    let calls = Arc::new(AtomicUsize::new(0));

    scanner(KnownHostsStore::load(&path).unwrap(), true, &calls)
        .scan(&home())
        .await;

    let quiet = scanner(KnownHostsStore::load(&path).unwrap(), true, &calls).with_probe(FakeProbe {
        replies: Vec::new(),
        calls: Arc::clone(&calls),
    });
    let report = quiet.scan(&home()).await;

    assert_eq!(report.error, None);
    assert_eq!(report.hosts.len(), 1);
    assert_eq!(report.hosts[0].status, HostStatus::Unknown);
    assert!(!report.hosts[0].is_new);
    assert_eq!(report.hosts_up(), 0);
}
