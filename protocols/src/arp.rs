use std::net::Ipv4Addr;

use anyhow::Context;
use pnet::packet::Packet;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::util::MacAddr;
use thiserror::Error;

pub const ETH_HDR_LEN: usize = 14;
pub const ARP_LEN: usize = 28;
/// Minimum Ethernet frame without the FCS; shorter frames get padded by some drivers anyway.
pub const MIN_ETH_FRAME_NO_FCS: usize = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArpFrameError {
    #[error("frame is not ARP")]
    NotArp,
    #[error("truncated or invalid ARP packet (payload len {0})")]
    Truncated(usize),
    #[error("ARP packet is not a reply")]
    NotReply,
}

/// Builds a broadcast "who-has `target_addr`" frame.
pub fn create_request(src_mac: MacAddr, src_addr: Ipv4Addr, target_addr: Ipv4Addr) -> anyhow::Result<Vec<u8>> {
    let mut buffer = vec![0u8; MIN_ETH_FRAME_NO_FCS];
    {
        let mut eth = MutableEthernetPacket::new(&mut buffer).context("failed to create ethernet header")?;
        eth.set_source(src_mac);
        eth.set_destination(MacAddr::broadcast());
        eth.set_ethertype(EtherTypes::Arp);
    }

    let mut arp_packet = MutableArpPacket::new(&mut buffer[ETH_HDR_LEN..ETH_HDR_LEN + ARP_LEN])
        .context("failed to create mutable ARP packet")?;
    arp_packet.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp_packet.set_protocol_type(EtherTypes::Ipv4);
    arp_packet.set_hw_addr_len(6);
    arp_packet.set_proto_addr_len(4);
    arp_packet.set_operation(ArpOperations::Request);
    arp_packet.set_sender_hw_addr(src_mac);
    arp_packet.set_target_hw_addr(MacAddr::zero());
    arp_packet.set_sender_proto_addr(src_addr);
    arp_packet.set_target_proto_addr(target_addr);

    Ok(buffer)
}

/// Extracts the responder's `(ip, mac)` from an ARP reply frame.
pub fn parse_reply(frame: &[u8]) -> Result<(Ipv4Addr, MacAddr), ArpFrameError> {
    let ethernet = EthernetPacket::new(frame).ok_or(ArpFrameError::Truncated(frame.len()))?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return Err(ArpFrameError::NotArp);
    }

    let payload = ethernet.payload();
    let arp = ArpPacket::new(payload).ok_or(ArpFrameError::Truncated(payload.len()))?;
    if arp.get_operation() != ArpOperations::Reply {
        return Err(ArpFrameError::NotReply);
    }

    Ok((arp.get_sender_proto_addr(), arp.get_sender_hw_addr()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
