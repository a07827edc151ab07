//! CLI interface for rootbot
//!
//! Command-line interface built on clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root bot host
///
/// Hosts a root bot that hands conversations to child skills over HTTP and
/// takes them back when the skill ends its session.
#[derive(Parser, Debug)]
#[command(name = "rootbot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP and WebSocket server
    Serve {
        /// Override the configured listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List configured skills
    Skills,

    /// Validate the configuration and exit
    CheckConfig,
}
