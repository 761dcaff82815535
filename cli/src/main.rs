mod commands;
mod terminal;

use anyhow::Context;
use commands::{CommandLine, Commands, cache, geocode, hosts, info, watch};
use lookout_common::config::Config;
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();
    logging::init(commands.verbose)?;

    let cfg = Config::load_or_default(&commands.config)
        .with_context(|| format!("loading {}", commands.config.display()))?;

    match commands.command {
        Some(Commands::Hosts) => {
            print::header("known hosts");
            hosts::list(&cfg)
        }
        Some(Commands::ClearCache) => {
            print::header("clearing cache");
            cache::clear(&cfg)
        }
        Some(Commands::Geocode { query }) => {
            print::header("geocoding");
            geocode::lookup(&query).await
        }
        Some(Commands::Info) => {
            print::header("network info");
            info::show().await
        }
        None => {
            print::banner();
            watch::watch(cfg, commands.once, commands.no_scan).await
        }
    }
}
