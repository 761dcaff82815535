//! # Known Hosts
//!
//! Every MAC address ever seen on a scanned network, with first and last
//! sighting. The whole mapping is kept in memory and rewritten atomically on
//! `save`. File layout: `{ "hosts": { "<mac>": HostRecord } }`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lookout_common::error::StoreError;
use lookout_common::models::{HostObservation, HostRecord};
use lookout_common::network::mac::{mac_key, normalize_mac};
use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct KnownHostsFile {
    #[serde(default)]
    hosts: BTreeMap<String, HostRecord>,
}

#[derive(Debug)]
pub struct KnownHostsStore {
    path: PathBuf,
    hosts: BTreeMap<String, HostRecord>,
    dirty: bool,
}

impl KnownHostsStore {
    /// Reads `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no known hosts file at {}, starting empty", path.display());
                return Ok(Self::empty(path));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let file: KnownHostsFile = serde_json::from_str(&raw)?;
        let mut hosts = BTreeMap::new();
        for (key, mut record) in file.hosts {
            let Some(mac) = normalize_mac(&key).or_else(|| normalize_mac(&record.mac)) else {
                warn!("skipping known host with unreadable MAC '{key}'");
                continue;
            };
            record.mac = mac.clone();
            hosts.insert(mac, record);
        }

        debug!("loaded {} known hosts from {}", hosts.len(), path.display());
        Ok(Self {
            path,
            hosts,
            dirty: false,
        })
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hosts: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_known(&self, mac: MacAddr) -> bool {
        self.hosts.contains_key(&mac_key(mac))
    }

    pub fn get(&self, mac: MacAddr) -> Option<&HostRecord> {
        self.hosts.get(&mac_key(mac))
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostRecord> {
        self.hosts.values()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records a sighting. Returns `true` when the MAC was not known before.
    ///
    /// `first_seen` is set once; `last_seen` never moves backwards. Hostname
    /// and vendor are only overwritten by an observation that carries them.
    pub fn upsert(&mut self, observation: &HostObservation, now: DateTime<Utc>) -> bool {
        self.dirty = true;
        let key = mac_key(observation.mac);

        if let Some(record) = self.hosts.get_mut(&key) {
            record.ip = Some(observation.ip);
            if observation.hostname.is_some() {
                record.hostname.clone_from(&observation.hostname);
            }
            if observation.vendor.is_some() {
                record.vendor.clone_from(&observation.vendor);
            }
            record.last_seen = record.last_seen.max(now);
            return false;
        }

        self.hosts.insert(
            key.clone(),
            HostRecord {
                mac: key,
                ip: Some(observation.ip),
                hostname: observation.hostname.clone(),
                vendor: observation.vendor.clone(),
                first_seen: now,
                last_seen: now,
            },
        );
        true
    }

    /// Writes the full mapping through a temp file and an atomic rename.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let file = KnownHostsFile {
            hosts: self.hosts.clone(),
        };
        let mut tmp = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, &file)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        self.dirty = false;
        debug!("saved {} known hosts to {}", self.hosts.len(), self.path.display());
        Ok(())
    }

    /// Saves only when something changed since the last save.
    pub fn flush(&mut self) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
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
    use chrono::Duration;
    use std::net::{IpAddr, Ipv4Addr};

    fn mac() -> MacAddr {
        MacAddr::new(0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01)
    }

    fn observation(last: u8) -> HostObservation {
        HostObservation::new(mac(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, last)))
    }

    fn store() -> (tempfile::TempDir, KnownHostsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = KnownHostsStore::load(dir.path().join("known_hosts.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn missing_file_is_empty_store() {
        let (_dir, store) = store();
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn upsert_reports_new_once() {
        let (_dir, mut store) = store();
        let now = Utc::now();
        assert!(store.upsert(&observation(10), now));
        assert!(!store.upsert(&observation(10), now));
        assert!(store.is_known(mac()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn first_seen_is_stable_and_last_seen_monotonic() {
        let (_dir, mut store) = store();
        let t0 = Utc::now();
        store.upsert(&observation(10), t0);
        store.upsert(&observation(11), t0 + Duration::minutes(5));
        store.upsert(&observation(12), t0 + Duration::minutes(1));

        let record = store.get(mac()).unwrap();
        assert_eq!(record.first_seen, t0);
        assert_eq!(record.last_seen, t0 + Duration::minutes(5));
        assert_eq!(record.ip, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 12))));
    }

    #[test]
    fn missing_fields_do_not_erase_known_ones() {
        let (_dir, mut store) = store();
        let now = Utc::now();
        let mut first = observation(10);
        first.hostname = Some("nas".into());
        first.vendor = Some("Synology".into());
        store.upsert(&first, now);
        store.upsert(&observation(10), now);

        let record = store.get(mac()).unwrap();
        assert_eq!(record.hostname.as_deref(), Some("nas"));
        assert_eq!(record.vendor.as_deref(), Some("Synology"));
    }

    #[test]
    fn save_and_reload() {
        let (dir, mut store) = store();
        store.upsert(&observation(10), Utc::now());
        store.save().unwrap();
        assert!(!store.is_dirty());

        let reloaded = KnownHostsStore::load(dir.path().join("known_hosts.json")).unwrap();
        assert!(reloaded.is_known(mac()));

        let raw = fs::read_to_string(dir.path().join("known_hosts.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(json["hosts"]["aa:bb:cc:00:00:01"].is_object());
    }

    #[test]
    fn upper_case_keys_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts.json");
        fs::write(
            &path,
            r#"{"hosts": {"AA:BB:CC:00:00:01": {"mac": "AA:BB:CC:00:00:01", "ip": "192.168.1.10",
                "first_seen": "2024-01-01T00:00:00Z", "last_seen": "2024-01-02T00:00:00Z"}}}"#,
        )
        .unwrap();

        let store = KnownHostsStore::load(&path).unwrap();
        assert!(store.is_known(mac()));
        assert_eq!(store.get(mac()).unwrap().mac, "aa:bb:cc:00:00:01");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(KnownHostsStore::load(&path), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn flush_only_writes_when_dirty() {
        let (dir, mut store) = store();
        assert!(!store.flush().unwrap());
        assert!(!dir.path().join("known_hosts.json").exists());

        store.upsert(&observation(10), Utc::now());
        assert!(store.flush().unwrap());
        assert!(!store.flush().unwrap());
    }
}
