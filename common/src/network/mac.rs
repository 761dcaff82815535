use pnet::util::MacAddr;

/// Parses `aa:bb:cc:dd:ee:ff`, `AA-BB-CC-DD-EE-FF`, `aabb.ccdd.eeff` or bare hex.
pub fn parse_mac(raw: &str) -> Option<MacAddr> {
    let groups: Vec<&str> = raw.trim().split([':', '-', '.']).collect();
    let well_formed = match groups.len() {
        6 => groups.iter().all(|g| g.len() == 2),
        3 => raw.contains('.') && groups.iter().all(|g| g.len() == 4),
        1 => groups[0].len() == 12,
        _ => false,
    };
    if !well_formed {
        return None;
    }

    let hex: String = groups.concat();
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let mut octets = [0u8; 6];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    let [a, b, c, d, e, f] = octets;
    Some(MacAddr::new(a, b, c, d, e, f))
}

/// Canonical store key: lower-case, colon separated.
pub fn normalize_mac(raw: &str) -> Option<String> {
    parse_mac(raw).map(mac_key)
}

pub fn mac_key(mac: MacAddr) -> String {
    // MacAddr's Display is already lower-case and zero padded.
    mac.to_string()
}

/// The vendor-identifying first three octets.
pub fn oui_prefix(mac: MacAddr) -> [u8; 3] {
    [mac.0, mac.1, mac.2]
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
