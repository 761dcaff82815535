use std::net::Ipv4Addr;

use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use pnet::util::MacAddr;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    /// The interface is operationally down.
    IsDown,
    /// Loopback never answers ARP for a LAN range.
    IsLoopback,
    /// The interface does not have a MAC address.
    NoMacAddress,
    /// The interface does not support broadcast (required for ARP).
    NotBroadcast,
    /// The interface is a point-to-point link (e.g., a VPN).
    IsPointToPoint,
}

/// The local side of an ARP sweep: which interface, and which identity to claim.
#[derive(Debug, Clone)]
pub struct LocalEndpoint {
    pub interface: NetworkInterface,
    pub mac: MacAddr,
    pub ipv4: Ipv4Addr,
}

/// Finds the interface attached to `target`.
pub fn endpoint_for_network(target: Ipv4Network) -> anyhow::Result<LocalEndpoint> {
    select_endpoint(datalink::interfaces(), target)
        .ok_or_else(|| anyhow::anyhow!("no usable interface is attached to {target}"))
}

/// Pure selection logic behind [`endpoint_for_network`].
pub fn select_endpoint(interfaces: Vec<NetworkInterface>, target: Ipv4Network) -> Option<LocalEndpoint> {
    interfaces
        .into_iter()
        .filter(|interface| is_viable_lan_interface(interface).is_ok())
        .find_map(|interface| {
            let ipv4 = interface.ips.iter().find_map(|net| match net {
                IpNetwork::V4(v4) if v4.contains(target.network()) => Some(v4.ip()),
                _ => None,
            })?;
            let mac = interface.mac?;
            Some(LocalEndpoint { interface, mac, ipv4 })
        })
}

/// The LAN address of the first viable interface.
pub fn primary_ipv4(interfaces: &[NetworkInterface]) -> Option<Ipv4Addr> {
    interfaces
        .iter()
        .filter(|interface| is_viable_lan_interface(interface).is_ok())
        .find_map(|interface| {
            interface.ips.iter().find_map(|net| match net {
                IpNetwork::V4(v4) => Some(v4.ip()),
                IpNetwork::V6(_) => None,
            })
        })
}

fn is_viable_lan_interface(interface: &NetworkInterface) -> Result<(), ViabilityError> {
    if !interface.is_up() {
        return Err(ViabilityError::IsDown);
    }
    if interface.is_loopback() {
        return Err(ViabilityError::IsLoopback);
    }
    if interface.mac.is_none() || interface.mac == Some(MacAddr::zero()) {
        return Err(ViabilityError::NoMacAddress);
    }
    if !interface.is_broadcast() {
        return Err(ViabilityError::NotBroadcast);
    }
    if interface.is_point_to_point() {
        return Err(ViabilityError::IsPointToPoint);
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

#[cfg(test)]
mod tests {
    use super::*;

    const IFF_UP: u32 = 1;
    const IFF_BROADCAST: u32 = 1 << 1;
    const IFF_LOOPBACK: u32 = 1 << 3;
    const IFF_POINTTOPOINT: u32 = 1 << 4;

    fn create_mock_interface(
        name: &str,
        mac: Option<MacAddr>,
        ips: Vec<IpNetwork>,
        flags: u32,
    ) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            description: "An interface".to_string(),
            index: 0,
            mac,
            ips,
            flags,
        }
    }

    fn default_mac() -> Option<MacAddr> {
        Some(MacAddr(0x1, 0x2, 0x3, 0x4, 0x5, 0x6))
    }

    fn lan_ips() -> Vec<IpNetwork> {
        vec![IpNetwork::V4("192.168.1.100/24".parse().unwrap())]
    }

    fn target() -> Ipv4Network {
        "192.168.1.0/24".parse().unwrap()
    }

    #[test]
    fn select_endpoint_should_pick_attached_interface() {
        let other = create_mock_interface(
            "eth1",
            default_mac(),
            vec![IpNetwork::V4("10.0.0.2/8".parse().unwrap())],
            IFF_UP | IFF_BROADCAST,
        );
        let lan = create_mock_interface("eth0", default_mac(), lan_ips(), IFF_UP | IFF_BROADCAST);

        let endpoint = select_endpoint(vec![other, lan], target()).expect("endpoint");
        assert_eq!(endpoint.interface.name, "eth0");
        assert_eq!(endpoint.ipv4, Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(endpoint.mac, MacAddr(0x1, 0x2, 0x3, 0x4, 0x5, 0x6));
    }

    #[test]
    fn select_endpoint_should_skip_unviable_interfaces() {
        let down = create_mock_interface("eth0", default_mac(), lan_ips(), IFF_BROADCAST);
        let loopback = create_mock_interface("lo", default_mac(), lan_ips(), IFF_UP | IFF_LOOPBACK);
        let vpn = create_mock_interface("tun0", default_mac(), lan_ips(), IFF_UP | IFF_POINTTOPOINT);
        let no_mac = create_mock_interface("eth2", None, lan_ips(), IFF_UP | IFF_BROADCAST);

        assert!(select_endpoint(vec![down, loopback, vpn, no_mac], target()).is_none());
    }

    #[test]
    fn is_viable_lan_interface_should_report_reason() {
        let vpn = create_mock_interface("tun0", default_mac(), lan_ips(), IFF_UP | IFF_BROADCAST | IFF_POINTTOPOINT);
        assert_eq!(is_viable_lan_interface(&vpn), Err(ViabilityError::IsPointToPoint));

        let no_broadcast = create_mock_interface("eth0", default_mac(), lan_ips(), IFF_UP);
        assert_eq!(is_viable_lan_interface(&no_broadcast), Err(ViabilityError::NotBroadcast));
    }

    #[test]
    fn primary_ipv4_skips_loopback_and_v6_only() {
        let loopback = create_mock_interface(
            "lo",
            default_mac(),
            vec![IpNetwork::V4("127.0.0.1/8".parse().unwrap())],
            IFF_UP | IFF_LOOPBACK,
        );
        let v6_only = create_mock_interface(
            "eth1",
            default_mac(),
            vec![IpNetwork::V6("fe80::1/64".parse().unwrap())],
            IFF_UP | IFF_BROADCAST,
        );
        let lan = create_mock_interface("eth0", default_mac(), lan_ips(), IFF_UP | IFF_BROADCAST);

        assert_eq!(primary_ipv4(&[loopback, v6_only, lan]), Some(Ipv4Addr::new(192, 168, 1, 100)));
        assert_eq!(primary_ipv4(&[]), None);
    }
}
