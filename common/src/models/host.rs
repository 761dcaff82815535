use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Up,
    Down,
    Unknown,
}

/// A previously discovered host, persisted in the known-hosts store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Lower-case, colon separated. Primary key.
    pub mac: String,
    pub ip: Option<IpAddr>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// What a scan learned about one responder, fed into the known-hosts store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostObservation {
    pub mac: MacAddr,
    pub ip: IpAddr,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
}

impl HostObservation {
    pub fn new(mac: MacAddr, ip: IpAddr) -> Self {
        Self {
            mac,
            ip,
            hostname: None,
            vendor: None,
        }
    }
}

/// One host line of a scan report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub ip: Option<IpAddr>,
    pub mac: Option<MacAddr>,
    pub hostname: Option<String>,
    pub vendor: Option<String>,
    pub status: HostStatus,
    /// Absent from the known-hosts store when this scan started.
    pub is_new: bool,
    /// Matched one of the target's expected identifiers.
    pub is_expected: bool,
}

impl ScanResult {
    pub fn up(ip: IpAddr, mac: MacAddr) -> Self {
        Self {
            ip: Some(ip),
            mac: Some(mac),
            hostname: None,
            vendor: None,
            status: HostStatus::Up,
            is_new: false,
            is_expected: false,
        }
    }

    pub fn with_status(status: HostStatus) -> Self {
        Self {
            ip: None,
            mac: None,
            hostname: None,
            vendor: None,
            status,
            is_new: false,
            is_expected: false,
        }
    }

    /// Best available name for display.
    pub fn display_name(&self) -> String {
        if let Some(hostname) = &self.hostname {
            return hostname.clone();
        }
        let ip = self.ip.map(|ip| ip.to_string());
        match (ip, &self.vendor, self.mac) {
            (Some(ip), Some(vendor), _) => format!("{ip} ({vendor})"),
            (Some(ip), None, _) => ip,
            (None, _, Some(mac)) => mac.to_string(),
            (None, _, None) => "unknown host".to_string(),
        }
    }
}

/// Report for one scanned target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetScan {
    pub target_name: String,
    pub target_range: String,
    pub hosts: Vec<ScanResult>,
    pub scanned_at: DateTime<Utc>,
    pub duration: Duration,
    pub error: Option<ScanError>,
}

impl TargetScan {
    pub fn new(target_name: impl Into<String>, target_range: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            target_range: target_range.into(),
            hosts: Vec::new(),
            scanned_at: Utc::now(),
            duration: Duration::ZERO,
            error: None,
        }
    }

    pub fn hosts_up(&self) -> usize {
        self.count(HostStatus::Up)
    }

    pub fn hosts_down(&self) -> usize {
        self.count(HostStatus::Down)
    }

    pub fn new_hosts(&self) -> impl Iterator<Item = &ScanResult> {
        self.hosts.iter().filter(|host| host.is_new)
    }

    fn count(&self, status: HostStatus) -> usize {
        self.hosts.iter().filter(|host| host.status == status).count()
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
