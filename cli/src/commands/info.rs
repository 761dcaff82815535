use std::time::Duration;

use lookout_core::network_info::NetworkInfoProbe;

use crate::terminal::print;

const WIDTH: usize = 9;

pub async fn show() -> anyhow::Result<()> {
    let probe = NetworkInfoProbe::new(Duration::from_secs(10))?;
    let info = probe.collect().await;

    let or_unknown = |value: Option<String>| value.unwrap_or_else(|| "unknown".to_string());
    print::aligned_line("Local", or_unknown(info.local_ip.map(|ip| ip.to_string())), WIDTH);
    print::aligned_line("Gateway", or_unknown(info.gateway_ip.map(|ip| ip.to_string())), WIDTH);
    print::aligned_line("Public", or_unknown(info.public_ip.map(|ip| ip.to_string())), WIDTH);

    let dns = info
        .dns_servers
        .iter()
        .map(|ip| ip.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    print::aligned_line("DNS", if dns.is_empty() { "unknown".to_string() } else { dns }, WIDTH);
    Ok(())
}
