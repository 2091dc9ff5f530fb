//! gpuprov
//!
//! One-shot node-initialization binary that provisions GPU support on a
//! cluster node: driver and toolkit installation, scheduler resource
//! registration, isolation setup, and kernel maintenance.

mod procedure;

use clap::Parser;
use gpuprov_core::{PlatformIdentity, ProvisionConfig};
use gpuprov_exec::{HttpFetcher, MetadataClient, SystemRunner};
use procedure::Procedure;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// GPU driver and scheduler-resource provisioning for cluster nodes
#[derive(Parser, Debug)]
#[command(name = "gpuprov")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    info!("Starting gpuprov v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => ProvisionConfig::from_file(path)?,
        None => ProvisionConfig::default(),
    };

    let platform = PlatformIdentity::detect()?;
    let procedure = Procedure::new(
        Arc::new(SystemRunner::new()),
        Arc::new(HttpFetcher::new()),
        Arc::new(MetadataClient::new(&config.metadata.endpoint)),
        config,
    );

    procedure.run(platform).await?;
    Ok(())
}
