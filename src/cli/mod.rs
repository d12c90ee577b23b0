use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "workspace-proxy")]
#[command(about = "HTTPS-only workspace proxy - blocks plain HTTP and websocket traffic")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "workspace-proxy.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Start,
    /// Write a default configuration file
    Init,
    /// Show decision counts from the decision log
    Status,
    /// View the decision log
    Logs {
        /// Show last N entries
        #[arg(long, default_value = "50")]
        tail: usize,
        /// Export all entries instead of printing a table
        #[arg(long)]
        export: bool,
        /// Export format (json or csv)
        #[arg(long, default_value = "json")]
        format: String,
    },
}
