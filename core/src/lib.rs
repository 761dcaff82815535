//! Acquisition engine: cache, feed fetcher, weather, network scanner and the
//! coordinator that schedules them, plus the local network-info probe.

pub mod cache;
pub mod coordinator;
pub mod fetcher;
pub mod known_hosts;
pub mod network_info;
pub mod retry;
pub mod scanner;
pub mod vendors;
pub mod weather;
