//! CLI arguments and server configuration.

use std::path::PathBuf;

use clap::Parser;

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "kaf")]
#[command(about = "Simple event store: append-only message logs over HTTP")]
#[command(version)]
pub struct CliArgs {
    /// Address to listen on, e.g. 127.0.0.1:7749
    pub addr: String,

    /// Path to the data directory holding one file per log
    pub data_dir: PathBuf,
}

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub data_dir: PathBuf,
}

impl From<&CliArgs> for ServerConfig {
    fn from(args: &CliArgs) -> Self {
        Self {
            addr: args.addr.clone(),
            data_dir: args.data_dir.clone(),
        }
    }
}
