//! Cross-crate scenarios. Everything here runs without network access or
//! raw-socket privileges: HTTP goes to a local mock server and the ARP probe
//! is replaced by a fixed responder list.

#[cfg(test)]
mod coordinator;
#[cfg(test)]
mod discovery;
#[cfg(test)]
mod feeds;
