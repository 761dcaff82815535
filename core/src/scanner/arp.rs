//! ARP sweep over a pnet datalink channel.
//!
//! Requires **root privileges**: the channel reads and writes raw Layer 2
//! frames on the interface attached to the target network.

use std::collections::BTreeMap;
use std::io;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use lookout_common::network::interface::{self, LocalEndpoint};
use lookout_common::network::range::{self, Ipv4Range};
use lookout_protocols::arp;
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::ipnetwork::Ipv4Network;
use pnet::util::MacAddr;
use tracing::{debug, trace};

const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Link-layer discovery port. Implementations block; callers run them on the
/// blocking pool.
pub trait ArpProbe: Send + Sync {
    /// Every `(ip, mac)` that answered within `timeout`, sorted by IP.
    fn probe(&self, network: Ipv4Network, timeout: Duration) -> anyhow::Result<Vec<(Ipv4Addr, MacAddr)>>;
}

pub struct PnetArpProbe;

impl ArpProbe for PnetArpProbe {
    fn probe(&self, network: Ipv4Network, timeout: Duration) -> anyhow::Result<Vec<(Ipv4Addr, MacAddr)>> {
        let endpoint: LocalEndpoint = interface::endpoint_for_network(network)?;
        debug!("sweeping {network} from {} ({})", endpoint.interface.name, endpoint.ipv4);
        let (mut tx, rx) = open_eth_channel(&endpoint.interface, &get_config(), datalink::channel)?;
        sweep(tx.as_mut(), rx, &endpoint, range::host_range(network), timeout)
    }
}

fn open_eth_channel<F>(
    intf: &NetworkInterface,
    cfg: &Config,
    channel_opener: F,
) -> anyhow::Result<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>)>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let ch: Channel = channel_opener(intf, *cfg).with_context(|| format!("opening on {}", intf.name))?;
    match ch {
        Channel::Ethernet(tx, rx) => Ok((tx, rx)),
        _ => bail!("non-ethernet channel for {}", intf.name),
    }
}

fn get_config() -> Config {
    Config {
        read_timeout: Some(READ_TIMEOUT),
        ..Default::default()
    }
}

/// Broadcasts one request per host address, then collects replies until
/// the deadline or until the capture ends.
fn sweep(
    tx: &mut dyn DataLinkSender,
    mut rx: Box<dyn DataLinkReceiver>,
    endpoint: &LocalEndpoint,
    targets: Ipv4Range,
    timeout: Duration,
) -> anyhow::Result<Vec<(Ipv4Addr, MacAddr)>> {
    let deadline = Instant::now() + timeout;

    for ip in targets.to_iter().filter(|ip| *ip != endpoint.ipv4) {
        let frame = arp::create_request(endpoint.mac, endpoint.ipv4, ip)?;
        if let Some(Err(e)) = tx.send_to(&frame, None) {
            return Err(e).with_context(|| format!("sending ARP request for {ip}"));
        }
    }

    let mut found: BTreeMap<Ipv4Addr, MacAddr> = BTreeMap::new();
    while Instant::now() < deadline {
        match rx.next() {
            Ok(frame) => match arp::parse_reply(frame) {
                Ok((ip, mac)) if targets.contains(ip) => {
                    found.entry(ip).or_insert(mac);
                }
                Ok((ip, _)) => trace!("ignoring reply from {ip}, outside target"),
                Err(_) => {}
            },
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => {
                debug!("capture ended early: {e}");
                break;
            }
        }
    }

    Ok(found.into_iter().collect())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
