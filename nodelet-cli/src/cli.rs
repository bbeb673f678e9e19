//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nodelet")]
#[command(about = "Node agent exposing a local or delegated runtime as a cluster node", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the providers for the configured runtime and serve until interrupted
    Start {
        /// Agent configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Node name (default: host name)
        #[arg(long)]
        node_name: Option<String>,
    },

    /// Check a configuration file without starting the agent
    Validate {
        /// Agent configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show version information
    Version,
}
