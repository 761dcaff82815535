//! # Lookout Protocols
//!
//! Byte-level helpers for the discovery pipeline. Nothing in here opens a
//! socket; callers own the I/O.
//!
//! * [`arp`]: Ethernet/ARP request frames and reply parsing.
//! * [`dns`]: reverse-lookup (PTR) query packets.
//! * [`mdns`]: hostname extraction from multicast DNS answers.

pub mod arp;
pub mod dns;
pub mod mdns;
