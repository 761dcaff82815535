pub mod cache;
pub mod geocode;
pub mod hosts;
pub mod info;
pub mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lookout_common::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "lookout")]
#[command(version, about = "Feeds, weather and your local network at a glance.")]
pub struct CommandLine {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run a single refresh cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Skip network discovery
    #[arg(long)]
    pub no_scan: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every host the scanner has ever seen
    #[command(alias = "h")]
    Hosts,
    /// Delete all cached feed and weather entries
    #[command(alias = "c")]
    ClearCache,
    /// Look up coordinates for a place name
    #[command(alias = "g")]
    Geocode { query: String },
    /// Show local, gateway, public and DNS addresses
    #[command(alias = "i")]
    Info,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
