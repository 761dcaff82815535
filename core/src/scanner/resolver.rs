//! Hostname lookups: reverse DNS through the system resolver, plus a
//! best-effort multicast DNS sweep for devices that only announce
//! themselves on the local link.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// How long the mDNS sweep listens for answers.
pub const MDNS_WINDOW: Duration = Duration::from_millis(1_500);

#[async_trait]
pub trait HostnameResolver: Send + Sync {
    /// Reverse lookup for one address. Callers bound the wait.
    async fn resolve(&self, ip: IpAddr) -> Option<String>;

    /// Names announced over mDNS for any of `ips`.
    async fn discover_mdns(&self, _ips: &[IpAddr]) -> HashMap<IpAddr, String> {
        HashMap::new()
    }
}

pub struct SystemResolver {
    mdns: bool,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self { mdns: cfg!(unix) }
    }

    pub fn without_mdns() -> Self {
        Self { mdns: false }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostnameResolver for SystemResolver {
    async fn resolve(&self, ip: IpAddr) -> Option<String> {
        let name = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip)).await.ok()?;
        match name {
            // getnameinfo hands back the numeric form when there is no PTR record
            Ok(name) if name.parse::<IpAddr>().is_err() => Some(short_name(&name)),
            Ok(_) => None,
            Err(e) => {
                debug!("reverse lookup for {ip} failed: {e}");
                None
            }
        }
    }

    async fn discover_mdns(&self, ips: &[IpAddr]) -> HashMap<IpAddr, String> {
        if !self.mdns || ips.is_empty() {
            return HashMap::new();
        }
        let ips = ips.to_vec();
        match tokio::task::spawn_blocking(move || mdns::sweep(&ips, MDNS_WINDOW)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                debug!("mDNS sweep failed: {e:#}");
                HashMap::new()
            }
            Err(e) => {
                debug!("mDNS worker failed: {e}");
                HashMap::new()
            }
        }
    }
}

/// `nas.fritz.box` -> `nas`
pub fn short_name(name: &str) -> String {
    name.trim_end_matches('.').split('.').next().unwrap_or(name).to_string()
}

#[cfg(unix)]
mod mdns {
    use std::collections::HashMap;
    use std::io;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
    use std::time::{Duration, Instant};

    use lookout_protocols::{dns, mdns};
    use tracing::trace;

    use super::short_name;

    const READ_TIMEOUT: Duration = Duration::from_millis(100);

    /// Sends one PTR query per address to the mDNS group from an ephemeral
    /// port. Responders answer such "legacy" queries by unicast to us.
    pub fn sweep(ips: &[IpAddr], window: Duration) -> anyhow::Result<HashMap<IpAddr, String>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        let group = SocketAddr::from((mdns::MDNS_V4_GROUP, mdns::MDNS_PORT));

        let base_id: u16 = rand::random();
        for (i, ip) in ips.iter().enumerate() {
            let query = dns::create_ptr_packet(ip, base_id.wrapping_add(i as u16), true)?;
            socket.send_to(&query, group)?;
        }

        let mut names = HashMap::new();
        let mut buf = [0u8; 9_000];
        let deadline = Instant::now() + window;
        while Instant::now() < deadline && names.len() < ips.len() {
            match socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    if let Ok(record) = mdns::extract_resource(&buf[..len])
                        && let Some(hostname) = record.hostname
                        && ips.contains(&from.ip())
                    {
                        trace!("mDNS: {} is {hostname}", from.ip());
                        names.insert(from.ip(), short_name(&hostname));
                    }
                }
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(names)
    }
}

#[cfg(not(unix))]
mod mdns {
    use std::collections::HashMap;
    use std::net::IpAddr;
    use std::time::Duration;

    pub fn sweep(_ips: &[IpAddr], _window: Duration) -> anyhow::Result<HashMap<IpAddr, String>> {
        Ok(HashMap::new())
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

    #[test]
    fn short_name_keeps_first_label() {
        assert_eq!(short_name("nas.fritz.box"), "nas");
        assert_eq!(short_name("printer.local."), "printer");
        assert_eq!(short_name("router"), "router");
    }

    #[tokio::test]
    async fn mdns_disabled_returns_nothing() {
        let resolver = SystemResolver::without_mdns();
        let ips = [IpAddr::from([192, 168, 1, 10])];
        assert!(resolver.discover_mdns(&ips).await.is_empty());
    }
}
