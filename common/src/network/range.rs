use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn to_iter(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        (self.start_addr..=self.end_addr).contains(&addr)
    }

    pub fn len(&self) -> usize {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        end.saturating_sub(start) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.start_addr > self.end_addr
    }
}

/// Parses a target's CIDR. Host bits are ignored, as in `192.168.1.7/24`.
pub fn parse_cidr(raw: &str) -> Result<Ipv4Network, ScanError> {
    let net = Ipv4Network::from_str(raw.trim())
        .map_err(|e| ScanError::Config(format!("invalid CIDR range '{raw}': {e}")))?;
    Ipv4Network::new(net.network(), net.prefix())
        .map_err(|e| ScanError::Config(format!("invalid CIDR range '{raw}': {e}")))
}

/// Probe-able host addresses of `net`. Network and broadcast addresses are
/// stripped unless the network is too small to have any others.
pub fn host_range(net: Ipv4Network) -> Ipv4Range {
    let network: u32 = net.network().into();
    let broadcast: u32 = net.broadcast().into();

    let start = network.saturating_add(1);
    let end = broadcast.saturating_sub(1);
    if net.prefix() < 31 && start <= end {
        Ipv4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(end))
    } else {
        Ipv4Range::new(net.network(), net.broadcast())
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
