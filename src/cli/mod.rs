//! CLI module for the build gateway
//!
//! - `serve`: run the gateway in front of the build daemon (default)

pub mod serve;

use clap::{Parser, Subcommand};

/// Authenticating gateway for a remote image builder
#[derive(Parser)]
#[command(name = "build-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Default)]
pub enum Command {
    /// Start the daemon and serve the gateway until idle or interrupted
    #[default]
    Serve,
}
