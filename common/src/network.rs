//! # Network Helpers
//!
//! * [`mac`]: MAC address parsing, normalization and OUI prefixes.
//! * [`range`]: CIDR parsing and host iteration for scan targets.
//! * [`interface`]: picking the local interface that reaches a target, and
//!   the machine's own LAN address.

pub mod interface;
pub mod mac;
pub mod range;
