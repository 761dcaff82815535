use anyhow::Context;
use colored::*;
use lookout_common::config::Config;
use lookout_core::known_hosts::KnownHostsStore;

use crate::terminal::print;

pub fn list(cfg: &Config) -> anyhow::Result<()> {
    let path = &cfg.network.known_hosts_path;
    let store = KnownHostsStore::load(path).with_context(|| format!("loading {}", path.display()))?;

    if store.is_empty() {
        print::print_status("no hosts recorded yet");
        return Ok(());
    }

    for (idx, host) in store.hosts().enumerate() {
        let name = host.hostname.as_deref().unwrap_or(&host.mac);
        print::tree_head(idx, name);

        let mut details: Vec<(String, ColoredString)> = vec![("MAC".into(), host.mac.as_str().normal())];
        if let Some(ip) = host.ip {
            details.push(("IP".into(), ip.to_string().normal()));
        }
        if let Some(vendor) = &host.vendor {
            details.push(("Vendor".into(), vendor.as_str().normal()));
        }
        details.push(("First".into(), host.first_seen.format("%Y-%m-%d %H:%M").to_string().dimmed()));
        details.push(("Last".into(), host.last_seen.format("%Y-%m-%d %H:%M").to_string().normal()));
        print::as_tree_one_level(&details);
    }
    print::print_status(format!("{} known host(s)", store.len()));
    Ok(())
}
