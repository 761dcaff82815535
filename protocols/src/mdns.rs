use std::{collections::HashSet, net::IpAddr};

use anyhow::{Context, Result};
use dns_parser::{Packet, RData};

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_V4_GROUP: [u8; 4] = [224, 0, 0, 251];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MdnsRecord {
    pub hostname: Option<String>,
    pub ips: HashSet<IpAddr>,
}

pub fn extract_resource(data: &[u8]) -> Result<MdnsRecord> {
    let packet = Packet::parse(data).context("failed to parse mDNS packet")?;
    let mut metadata: MdnsRecord = MdnsRecord::default();

    for record in packet.answers.iter().chain(packet.additional.iter()) {
        match &record.data {
            RData::PTR(ptr) => {
                let name: String = ptr.0.to_string();
                if !name.ends_with(".arpa") {
                    metadata.hostname = Some(short_hostname(&name));
                }
            }

            RData::A(a) => {
                metadata.ips.insert(IpAddr::V4(a.0));
            }

            RData::AAAA(aaaa) => {
                metadata.ips.insert(IpAddr::V6(aaaa.0));
            }

            _ => {}
        }
    }

    Ok(metadata)
}

/// `printer.local.` -> `printer`
pub fn short_hostname(name: &str) -> String {
    name.trim_end_matches('.')
        .trim_end_matches(".local")
        .to_string()
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

    fn encode(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for label in name.split('.').filter(|l| !l.is_empty()) {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    fn ptr_response(owner: &str, target: &str) -> Vec<u8> {
        let mut bytes = vec![
            0x00, 0x00, // id
            0x84, 0x00, // response, authoritative
            0x00, 0x00, // questions
            0x00, 0x01, // answers
            0x00, 0x00, // authority
            0x00, 0x00, // additional
        ];
        let rdata = encode(target);
        bytes.extend(encode(owner));
        bytes.extend([0x00, 0x0c]); // PTR
        bytes.extend([0x00, 0x01]); // IN
        bytes.extend([0x00, 0x00, 0x00, 0x78]); // ttl
        bytes.extend((rdata.len() as u16).to_be_bytes());
        bytes.extend(rdata);
        bytes
    }

    #[test]
    fn extracts_ptr_hostname() {
        let bytes = ptr_response("10.1.168.192.in-addr.arpa", "printer.local");
        let record = extract_resource(&bytes).unwrap();
        assert_eq!(record.hostname.as_deref(), Some("printer"));
    }

    #[test]
    fn ignores_reverse_names_as_hostnames() {
        let bytes = ptr_response("x.local", "10.1.168.192.in-addr.arpa");
        let record = extract_resource(&bytes).unwrap();
        assert_eq!(record.hostname, None);
    }

    #[test]
    fn rejects_garbage() {
        assert!(extract_resource(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn short_hostname_strips_local_suffix() {
        assert_eq!(short_hostname("nas.local."), "nas");
        assert_eq!(short_hostname("nas"), "nas");
    }
}
