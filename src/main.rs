//! Kaf server binary entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kaf::server::{CliArgs, KafServer, ServerConfig};
use kaf::{stats, Registry};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Wrong usage prints help and exits cleanly
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return;
        }
    };
    let config = ServerConfig::from(&args);

    // Load every log already on disk; a log that fails to scan is fatal
    let registry = Registry::boot(config.data_dir.clone())
        .await
        .expect("failed loading logs from data directory");

    stats::spawn(registry.clone(), stats::STATS_INTERVAL);

    KafServer::new(registry, config).run().await;
}
