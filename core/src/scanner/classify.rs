//! Turns raw responders into a report: which hosts are new, which were
//! expected, and which expected or previously seen hosts stayed silent.

use std::net::IpAddr;

use lookout_common::models::{HostRecord, HostStatus, ScanResult};
use lookout_common::network::mac::{mac_key, normalize_mac, parse_mac};
use lookout_common::network::range::Ipv4Range;

use crate::known_hosts::KnownHostsStore;

/// One entry of a target's `expected_hosts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Mac(String),
    Ip(IpAddr),
    Hostname(String),
}

impl Identifier {
    /// IP first, then MAC, anything else is a hostname.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(ip) = raw.parse::<IpAddr>() {
            return Some(Self::Ip(ip));
        }
        if let Some(mac) = normalize_mac(raw) {
            return Some(Self::Mac(mac));
        }
        Some(Self::Hostname(raw.to_lowercase()))
    }

    pub fn matches(&self, host: &ScanResult) -> bool {
        match self {
            Self::Mac(mac) => host.mac.is_some_and(|m| mac_key(m) == *mac),
            Self::Ip(ip) => host.ip == Some(*ip),
            Self::Hostname(name) => host.hostname.as_ref().is_some_and(|h| h.to_lowercase() == *name),
        }
    }

    fn matches_record(&self, record: &HostRecord) -> bool {
        match self {
            Self::Mac(mac) => record.mac == *mac,
            Self::Ip(ip) => record.ip == Some(*ip),
            Self::Hostname(name) => record.hostname.as_ref().is_some_and(|h| h.to_lowercase() == *name),
        }
    }

    /// A report line for a host that did not answer. Fields the identifier
    /// does not carry are filled from the known-hosts store when possible.
    fn silent_host(&self, status: HostStatus, store: &KnownHostsStore) -> ScanResult {
        let mut host = ScanResult::with_status(status);
        host.is_expected = true;

        if let Some(record) = store.hosts().find(|r| self.matches_record(r)) {
            host.mac = parse_mac(&record.mac);
            host.ip = record.ip;
            host.hostname.clone_from(&record.hostname);
            host.vendor.clone_from(&record.vendor);
        }
        match self {
            Self::Mac(mac) => host.mac = parse_mac(mac),
            Self::Ip(ip) => host.ip = Some(*ip),
            Self::Hostname(name) => host.hostname = Some(name.clone()),
        }
        host
    }
}

pub fn parse_expected(raw: &[String]) -> Vec<Identifier> {
    raw.iter().filter_map(|r| Identifier::parse(r)).collect()
}

/// Marks responders, appends a `Down` line for every expected host that did
/// not answer and an `Unknown` line for every other known host inside `range`
/// that stayed silent. Must run before the responders are written to `store`.
pub fn classify(responders: &mut Vec<ScanResult>, expected: &[Identifier], store: &KnownHostsStore, range: Ipv4Range) {
    for host in responders.iter_mut() {
        host.is_new = host.mac.is_some_and(|mac| !store.is_known(mac));
        host.is_expected = expected.iter().any(|id| id.matches(host));
    }

    let missing: Vec<ScanResult> = expected
        .iter()
        .filter(|id| !responders.iter().any(|host| id.matches(host)))
        .map(|id| id.silent_host(HostStatus::Down, store))
        .collect();
    responders.extend(missing);
    append_silent_known(responders, store, range);
}

/// Report used when the network cannot be probed at all: every expected
/// host and every known host inside `range` is `Unknown`.
pub fn unknown_report(expected: &[Identifier], store: &KnownHostsStore, range: Ipv4Range) -> Vec<ScanResult> {
    let mut report: Vec<ScanResult> = expected
        .iter()
        .map(|id| id.silent_host(HostStatus::Unknown, store))
        .collect();
    append_silent_known(&mut report, store, range);
    report
}

fn append_silent_known(report: &mut Vec<ScanResult>, store: &KnownHostsStore, range: Ipv4Range) {
    let silent: Vec<ScanResult> = store
        .hosts()
        .filter(|record| in_range(record, range))
        .filter(|record| !report.iter().any(|host| describes(host, record)))
        .map(known_host)
        .collect();
    report.extend(silent);
}

fn in_range(record: &HostRecord, range: Ipv4Range) -> bool {
    matches!(record.ip, Some(IpAddr::V4(ip)) if range.contains(ip))
}

/// Whether `host` already stands for `record` in a report.
fn describes(host: &ScanResult, record: &HostRecord) -> bool {
    match host.mac {
        Some(mac) => mac_key(mac) == record.mac,
        None => host.ip.is_some() && host.ip == record.ip,
    }
}

fn known_host(record: &HostRecord) -> ScanResult {
    let mut host = ScanResult::with_status(HostStatus::Unknown);
    host.mac = parse_mac(&record.mac);
    host.ip = record.ip;
    host.hostname.clone_from(&record.hostname);
    host.vendor.clone_from(&record.vendor);
    host
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
