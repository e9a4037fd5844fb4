//! psmd - power shelf manager daemon

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use powershelf_service::{LoggingConfig, ServiceConfig, ServiceDaemon, init_logging};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "psmd", version, about = "Power shelf manager daemon")]
struct Args {
    /// JSON or YAML config file. Without it, defaults plus environment.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the gRPC listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Start with firmware uploads disabled
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("received ctrl-c");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig::from_verbosity(tracing::Level::INFO, args.verbose))
        .context("failed to initialize logging")?;
    info!("starting psmd v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ServiceConfig::load(args.config.as_deref())
        .await
        .context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    config.dry_run |= args.dry_run;

    let daemon = ServiceDaemon::new(config)
        .await
        .context("failed to initialize power shelf manager")?;
    daemon
        .run(shutdown_signal())
        .await
        .context("power shelf manager stopped with an error")?;

    info!("psmd stopped");
    Ok(())
}
