//! # Configuration
//!
//! The already-validated configuration value consumed by the core.
//!
//! Raw JSON is parsed and checked exactly once, in [`Config::from_json`] or
//! [`Config::load`]. Everything downstream only ever sees a [`Config`] that
//! passed [`Config::validate`].

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use pnet::ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 3;
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Wire format of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    #[default]
    Rss,
    Json,
}

/// A single news feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: FeedKind,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Locates the item array inside a JSON body, e.g. `$.data.children`.
    #[serde(default)]
    pub json_path: Option<String>,
}

impl FeedSource {
    /// Cache identity of this source.
    pub fn cache_key(&self) -> String {
        format!("feed:{}", self.url)
    }
}

/// A network range to scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTarget {
    pub name: String,
    /// CIDR notation, e.g. `192.168.1.0/24`.
    #[serde(rename = "range")]
    pub cidr_range: String,
    /// MAC addresses, IP addresses or hostnames that should answer.
    #[serde(default)]
    pub expected_hosts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub enabled: bool,
    pub targets: Vec<NetworkTarget>,
    pub dns_timeout_seconds: f64,
    pub arp_timeout_seconds: f64,
    pub scan_interval_minutes: u64,
    pub known_hosts_path: PathBuf,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            targets: Vec::new(),
            dns_timeout_seconds: 1.0,
            arp_timeout_seconds: 3.0,
            scan_interval_minutes: 15,
            known_hosts_path: PathBuf::from("known_hosts.json"),
        }
    }
}

/// Location the weather collaborator is queried for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub enabled: bool,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            location_name: "Berlin".to_string(),
            latitude: 52.52,
            longitude: 13.41,
        }
    }
}

impl WeatherConfig {
    /// Cache identity of this location, rounded so float noise does not split entries.
    pub fn cache_key(&self) -> String {
        format!("weather:{:.4},{:.4}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub refresh_interval_minutes: u64,
    pub cache_ttl_minutes: u64,
    pub max_concurrent_fetches: usize,
    pub cache_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: 15,
            cache_ttl_minutes: 5,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            cache_dir: PathBuf::from(".cache"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feeds: Vec<FeedSource>,
    pub network: NetworkConfig,
    pub weather: WeatherConfig,
    pub settings: Settings,
}

impl Config {
    /// Parses and validates a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Like [`Config::load`] but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for feed in &self.feeds {
            validate_url(&feed.url)?;
            if let Some(path) = &feed.json_path
                && path.matches('[').count() != path.matches(']').count()
            {
                return invalid(format!("feed '{}': unbalanced brackets in json_path", feed.name));
            }
        }

        for target in &self.network.targets {
            Ipv4Network::from_str(&target.cidr_range).map_err(|e| {
                ConfigError::Invalid(format!(
                    "target '{}': invalid CIDR range '{}': {e}",
                    target.name, target.cidr_range
                ))
            })?;
        }

        if !(-90.0..=90.0).contains(&self.weather.latitude) {
            return invalid(format!("latitude must be between -90 and 90, got {}", self.weather.latitude));
        }
        if !(-180.0..=180.0).contains(&self.weather.longitude) {
            return invalid(format!("longitude must be between -180 and 180, got {}", self.weather.longitude));
        }
        if self.settings.max_concurrent_fetches == 0 {
            return invalid("max_concurrent_fetches must be at least 1".to_string());
        }
        if self.settings.refresh_interval_minutes == 0 {
            return invalid("refresh_interval_minutes must be at least 1".to_string());
        }
        if self.network.scan_interval_minutes == 0 {
            return invalid("scan_interval_minutes must be at least 1".to_string());
        }
        if !(self.network.dns_timeout_seconds > 0.0 && self.network.arp_timeout_seconds > 0.0) {
            return invalid("network timeouts must be positive".to_string());
        }
        Ok(())
    }

    pub fn enabled_feeds(&self) -> Vec<FeedSource> {
        self.feeds.iter().filter(|feed| feed.enabled).cloned().collect()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.cache_ttl_minutes * 60)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.settings.refresh_interval_minutes * 60)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.network.scan_interval_minutes * 60)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.network.dns_timeout_seconds)
    }

    pub fn arp_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.network.arp_timeout_seconds)
    }
}

fn enabled_by_default() -> bool {
    true
}

fn invalid(msg: String) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg))
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return invalid(format!("invalid URL '{url}': missing scheme"));
    };
    if scheme != "http" && scheme != "https" {
        return invalid(format!("URL must use http or https scheme, got '{scheme}'"));
    }
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return invalid(format!("invalid URL '{url}': missing host"));
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
