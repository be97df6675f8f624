use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bully",
    about = "Live monitor for a Bully leader-election cluster",
    version = env!("CARGO_PKG_VERSION"),
    author = "Bully Monitor Team",
    long_about = "Watches a cluster running the Bully leader-election algorithm. Combines periodic status pulls with a push channel of leader-change notifications and shows who leads and what state every node is in."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Base URL of the node serving the status endpoints
    #[arg(short, long, value_name = "URL")]
    pub url: Option<String>,

    /// WebSocket URL of the push channel
    #[arg(short, long, value_name = "URL")]
    pub push_url: Option<String>,

    /// Seconds between periodic pulls
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u64>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Watch the cluster until interrupted (default)
    Watch {
        /// Keep previous frames instead of clearing the screen
        #[arg(long)]
        no_clear: bool,
    },

    /// Pull the status once and print it
    Status,

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Output file
        #[arg(short, long, default_value = "bully.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
