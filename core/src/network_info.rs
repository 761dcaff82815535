//! # Network Info
//!
//! How this machine sits on the network: its LAN address, the default
//! gateway, the configured resolvers and the public address other hosts see.
//! Local details come from the interface list and system files; the public
//! address is asked from a chain of echo services, each with its own retries.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use lookout_common::error::FetchError;
use lookout_common::network::interface::primary_ipv4;
use pnet::datalink;
use serde::Deserialize;
use tracing::debug;

use crate::fetcher::transport::{build_client, check_status, map_reqwest_error};
use crate::retry::RetryPolicy;

pub const PUBLIC_IP_SERVICES: [&str; 3] = [
    "https://api.ipify.org?format=json",
    "https://api.my-ip.io/v2/ip.json",
    "https://ipinfo.io/json",
];

const ROUTE_TABLE: &str = "/proc/net/route";
const RESOLV_CONF: &str = "/etc/resolv.conf";
const MAX_DNS_SERVERS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub local_ip: Option<Ipv4Addr>,
    pub gateway_ip: Option<Ipv4Addr>,
    pub dns_servers: Vec<IpAddr>,
    pub public_ip: Option<IpAddr>,
}

pub struct NetworkInfoProbe {
    client: reqwest::Client,
    services: Vec<String>,
    retry: RetryPolicy,
}

impl NetworkInfoProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            services: PUBLIC_IP_SERVICES.iter().map(|url| url.to_string()).collect(),
            retry: RetryPolicy {
                max_retries: 2,
                initial_backoff: Duration::from_millis(500),
                multiplier: 2.0,
                max_backoff: Duration::from_secs(5),
            },
        })
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Everything at once. Parts that cannot be determined stay empty.
    pub async fn collect(&self) -> NetworkInfo {
        let local = tokio::task::spawn_blocking(local_details)
            .await
            .unwrap_or_else(|e| {
                debug!("local network details failed: {e}");
                NetworkInfo::default()
            });
        NetworkInfo {
            public_ip: self.public_ip().await,
            ..local
        }
    }

    /// The first service that names an address wins.
    pub async fn public_ip(&self) -> Option<IpAddr> {
        for url in &self.services {
            match self.ask(url).await {
                Ok(Some(ip)) => return Some(ip),
                Ok(None) => debug!("{url}: no address in response"),
                Err(e) => debug!("{url}: {e}"),
            }
        }
        None
    }

    async fn ask(&self, url: &str) -> Result<Option<IpAddr>, FetchError> {
        let client = &self.client;
        let body = self
            .retry
            .run(url, move || async move {
                let response = client.get(url).send().await.map_err(map_reqwest_error)?;
                check_status(response.status())?;
                response.text().await.map_err(map_reqwest_error)
            })
            .await?;
        let answer: EchoAnswer = serde_json::from_str(&body).map_err(|e| FetchError::ParseError(e.to_string()))?;
        Ok(answer.ip.or(answer.origin).and_then(|raw| raw.trim().parse().ok()))
    }
}

/// Echo services disagree on the field name.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EchoAnswer {
    ip: Option<String>,
    origin: Option<String>,
}

fn local_details() -> NetworkInfo {
    NetworkInfo {
        local_ip: primary_ipv4(&datalink::interfaces()),
        gateway_ip: read_optional(ROUTE_TABLE).as_deref().and_then(parse_default_gateway),
        dns_servers: read_optional(RESOLV_CONF)
            .as_deref()
            .map(parse_nameservers)
            .unwrap_or_default(),
        public_ip: None,
    }
}

fn read_optional(path: &str) -> Option<String> {
    fs::read_to_string(path)
        .inspect_err(|e| debug!("cannot read {path}: {e}"))
        .ok()
}

/// Gateway of the default route in a Linux `/proc/net/route` table, where
/// addresses are little-endian hex.
pub fn parse_default_gateway(table: &str) -> Option<Ipv4Addr> {
    table.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace().skip(1);
        let destination = fields.next()?;
        let gateway = fields.next()?;
        if destination != "00000000" {
            return None;
        }
        let raw = u32::from_str_radix(gateway, 16).ok()?;
        let addr = Ipv4Addr::from(raw.to_le_bytes());
        (!addr.is_unspecified()).then_some(addr)
    })
}

/// `nameserver` lines of a resolv.conf, deduplicated, at most three.
pub fn parse_nameservers(conf: &str) -> Vec<IpAddr> {
    let mut servers: Vec<IpAddr> = Vec::new();
    for line in conf.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("nameserver") {
            continue;
        }
        if let Some(ip) = parts.next().and_then(|raw| raw.parse::<IpAddr>().ok())
            && !servers.contains(&ip)
        {
            servers.push(ip);
        }
    }
    servers.truncate(MAX_DNS_SERVERS);
    servers
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
