//! CLI argument parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "airdrop-robots")]
#[command(about = "Airdrop robots minting Terminus pool tokens to untouched entity addresses", long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "AIRDROP_ROBOTS_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the config directory and an empty robots list
    GenerateConfig {
        /// Path to the robots config file (default: ~/.robots/config.json)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Run every configured robot until interrupted
    Run {
        /// Path to the robots config file (default: ~/.robots/config.json)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print the version
    Version,
}
