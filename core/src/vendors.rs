use std::sync::OnceLock;

use lookout_common::network::mac::oui_prefix;
use lookout_common::vendors::VendorRepository;
use mac_oui::Oui;
use pnet::util::MacAddr;
use tracing::{debug, warn};

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

/// Vendors that matter on home networks, used when the OUI database has no answer.
const FALLBACK_VENDORS: [([u8; 3], &str); 9] = [
    ([0x00, 0x50, 0x56], "VMware"),
    ([0x00, 0x0C, 0x29], "VMware"),
    ([0x08, 0x00, 0x27], "VirtualBox"),
    ([0x52, 0x54, 0x00], "QEMU"),
    ([0xB8, 0x27, 0xEB], "Raspberry Pi"),
    ([0xDC, 0xA6, 0x32], "Raspberry Pi"),
    ([0xE4, 0x5F, 0x01], "Raspberry Pi"),
    ([0x00, 0x17, 0x88], "Philips Hue"),
    ([0xEC, 0xB5, 0xFA], "Philips Hue"),
];

const SHORT_NAMES: [(&str, &str); 21] = [
    ("Apple, Inc.", "Apple"),
    ("Samsung Electronics Co.,Ltd", "Samsung"),
    ("Intel Corporate", "Intel"),
    ("Raspberry Pi Foundation", "Raspberry Pi"),
    ("Raspberry Pi Trading Ltd", "Raspberry Pi"),
    ("HUAWEI TECHNOLOGIES CO.,LTD", "Huawei"),
    ("Amazon Technologies Inc.", "Amazon"),
    ("Google, Inc.", "Google"),
    ("Microsoft Corporation", "Microsoft"),
    ("Sony Corporation", "Sony"),
    ("LG Electronics", "LG"),
    ("Xiaomi Communications Co Ltd", "Xiaomi"),
    ("TP-LINK TECHNOLOGIES CO.,LTD.", "TP-Link"),
    ("ASUSTek COMPUTER INC.", "ASUS"),
    ("Hewlett Packard", "HP"),
    ("Dell Inc.", "Dell"),
    ("Cisco Systems, Inc", "Cisco"),
    ("NETGEAR", "Netgear"),
    ("Belkin International Inc.", "Belkin"),
    ("Hon Hai Precision Ind. Co.,Ltd.", "Foxconn"),
    ("Espressif Inc.", "Espressif"),
];

/// Loads the bundled database on first use. Concurrent first callers block
/// on the same initialization; a failed load is remembered and not retried.
fn get_oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => {
                debug!("OUI database loaded");
                Some(db)
            }
            Err(_) => {
                warn!("failed to load OUI database, using built-in vendor table only");
                None
            }
        })
        .as_ref()
}

/// OUI lookups backed by `mac_oui`. Blocking on first call.
pub struct OuiVendorRepo;

impl VendorRepository for OuiVendorRepo {
    fn get_vendor(&self, mac: MacAddr) -> Option<String> {
        let from_db = get_oui_db().and_then(|db| match db.lookup_by_mac(&mac.to_string()) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            _ => None,
        });

        from_db
            .filter(|name| !name.trim().is_empty())
            .map(|name| shorten_vendor_name(name.trim()))
            .or_else(|| fallback_vendor(mac).map(str::to_string))
    }
}

pub fn fallback_vendor(mac: MacAddr) -> Option<&'static str> {
    let prefix = oui_prefix(mac);
    FALLBACK_VENDORS
        .iter()
        .find(|(oui, _)| *oui == prefix)
        .map(|(_, name)| *name)
}

pub fn shorten_vendor_name(vendor: &str) -> String {
    SHORT_NAMES
        .iter()
        .find(|(long, _)| *long == vendor)
        .map_or_else(|| vendor.to_string(), |(_, short)| short.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
